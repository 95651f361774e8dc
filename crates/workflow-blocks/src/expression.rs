//! Sandboxed expression and template evaluation via minijinja
//!
//! User-authored code in transformer blocks is evaluated with a Jinja-style
//! expression language. The environment has no loader, no filesystem and
//! no network access; expressions can only read the variables they are
//! given and apply the built-in filters and tests.

use block_engine::{BlockEngineError, Result};
use minijinja::Environment;
use serde::Serialize;
use serde_json::Value;

/// Evaluator for expressions (`input.price * 2`) and templates (`Hi {{ name }}`)
pub struct ExpressionEvaluator {
    env: Environment<'static>,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_recursion_limit(64);
        Self { env }
    }

    /// Evaluate an expression against a set of variables
    pub fn eval<S: Serialize>(&self, expression: &str, vars: S) -> Result<Value> {
        let compiled = self
            .env
            .compile_expression(expression)
            .map_err(|e| BlockEngineError::failed(format!("Expression parse error: {}", e)))?;
        let ctx = minijinja::Value::from_serialize(vars);
        let result = compiled
            .eval(ctx)
            .map_err(|e| BlockEngineError::failed(format!("Expression error: {}", e)))?;
        serde_json::to_value(&result).map_err(BlockEngineError::from)
    }

    /// Evaluate an expression and interpret the result as a condition
    pub fn eval_bool<S: Serialize>(&self, expression: &str, vars: S) -> Result<bool> {
        let compiled = self
            .env
            .compile_expression(expression)
            .map_err(|e| BlockEngineError::failed(format!("Expression parse error: {}", e)))?;
        compiled
            .eval(minijinja::Value::from_serialize(vars))
            .map(|v| v.is_true())
            .map_err(|e| BlockEngineError::failed(format!("Expression error: {}", e)))
    }

    /// Render a template against a set of variables
    pub fn render<S: Serialize>(&self, template: &str, vars: S) -> Result<String> {
        self.env
            .render_str(template, minijinja::Value::from_serialize(vars))
            .map_err(|e| BlockEngineError::failed(format!("Template error: {}", e)))
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
