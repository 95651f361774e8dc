//! Core types for block workflows
//!
//! These types define the dataflow model: typed ports, block definitions
//! (catalog entries), block instances (placed, stateful occurrences),
//! connectors owned by the external scene, and the bindings derived from them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a block instance, owned by the external scene
pub type InstanceId = String;

/// Identifier of a port, unique within its block definition
pub type PortId = String;

/// Identifier of a connector, owned by the external scene
pub type ConnectorId = String;

/// Values gathered for a block's input ports, keyed by port id
pub type BlockInputs = HashMap<PortId, serde_json::Value>;

/// Values produced by a block's output ports, keyed by port id
pub type BlockOutputs = HashMap<PortId, serde_json::Value>;

/// The data type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Text string
    Text,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// File reference
    File,
    /// Image reference or encoded image data
    Image,
    /// Wildcard, compatible with every type in both directions
    Any,
}

impl PortDataType {
    /// Every member of the closed type set
    pub const ALL: [PortDataType; 8] = [
        PortDataType::Text,
        PortDataType::Number,
        PortDataType::Boolean,
        PortDataType::Object,
        PortDataType::Array,
        PortDataType::File,
        PortDataType::Image,
        PortDataType::Any,
    ];

    /// The wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDataType::Text => "text",
            PortDataType::Number => "number",
            PortDataType::Boolean => "boolean",
            PortDataType::Object => "object",
            PortDataType::Array => "array",
            PortDataType::File => "file",
            PortDataType::Image => "image",
            PortDataType::Any => "any",
        }
    }
}

impl fmt::Display for PortDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a source type can connect to a port accepting `accepted`
///
/// True when the accepted set contains the wildcard, when the source is the
/// wildcard, or when the source type is a member of the accepted set.
pub fn is_compatible(source: PortDataType, accepted: &[PortDataType]) -> bool {
    source == PortDataType::Any
        || accepted.contains(&PortDataType::Any)
        || accepted.contains(&source)
}

/// Input port on a block definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPort {
    /// Port identifier
    pub id: PortId,
    /// Human-readable name
    pub name: String,
    /// Declared data type
    pub data_type: PortDataType,
    /// Types this port accepts (may include the wildcard)
    pub accepts: Vec<PortDataType>,
    /// Whether a value must be supplied by a binding or a static input
    pub required: bool,
    /// Value used when neither a binding nor a static input supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl InputPort {
    /// Create a required port accepting only its declared type
    pub fn required(id: impl Into<String>, name: impl Into<String>, data_type: PortDataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type,
            accepts: vec![data_type],
            required: true,
            default_value: None,
        }
    }

    /// Create an optional port accepting only its declared type
    pub fn optional(id: impl Into<String>, name: impl Into<String>, data_type: PortDataType) -> Self {
        Self {
            required: false,
            ..Self::required(id, name, data_type)
        }
    }

    /// Replace the accepted type set
    pub fn accepting(mut self, types: impl IntoIterator<Item = PortDataType>) -> Self {
        self.accepts = types.into_iter().collect();
        self
    }

    /// Set a default value for this port
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Whether this port accepts values of `source`
    pub fn accepts_type(&self, source: PortDataType) -> bool {
        is_compatible(source, &self.accepts)
    }

    /// Whether the accepted set contains the wildcard
    pub fn accepts_any(&self) -> bool {
        self.accepts.contains(&PortDataType::Any)
    }
}

/// Output port on a block definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPort {
    /// Port identifier
    pub id: PortId,
    /// Human-readable name
    pub name: String,
    /// The single type this port produces
    pub data_type: PortDataType,
}

impl OutputPort {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: PortDataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type,
        }
    }
}

/// Display category of a block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// Starts a workflow
    Trigger,
    /// Side-effecting operations (HTTP calls, delays)
    Action,
    /// Branching and comparison
    Condition,
    /// Pure data transformation
    Transformer,
    /// Language-model, image and speech blocks
    Ai,
    /// Display, logging and notification sinks
    Output,
}

impl BlockCategory {
    pub const ALL: [BlockCategory; 6] = [
        BlockCategory::Trigger,
        BlockCategory::Action,
        BlockCategory::Condition,
        BlockCategory::Transformer,
        BlockCategory::Ai,
        BlockCategory::Output,
    ];
}

/// Immutable catalog entry describing one kind of block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    /// Globally unique type identifier (e.g., "http-request")
    pub block_type: String,
    /// Category for grouping in catalogs
    pub category: BlockCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the block does
    #[serde(default)]
    pub description: String,
    /// Ordered input ports
    pub inputs: Vec<InputPort>,
    /// Ordered output ports
    pub outputs: Vec<OutputPort>,
    /// JSON schema describing the configuration object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<serde_json::Value>,
    /// Configuration given to newly placed instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<serde_json::Value>,
}

impl BlockDefinition {
    /// Create a definition with no ports
    pub fn new(block_type: impl Into<String>, category: BlockCategory, label: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            category,
            label: label.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config_schema: None,
            default_config: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append an input port
    pub fn input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    /// Append an output port
    pub fn output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = Some(schema);
        self
    }

    pub fn with_default_config(mut self, config: serde_json::Value) -> Self {
        self.default_config = Some(config);
        self
    }

    /// Find an input port by id
    pub fn input_port(&self, port_id: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Find an output port by id
    pub fn output_port(&self, port_id: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.id == port_id)
    }
}

/// Per-instance execution state
///
/// `idle → running → {success, error}`; a reset returns any state to idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

/// One placed occurrence of a block definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    /// Scene-owned identifier
    pub id: InstanceId,
    /// Type identifier of the block definition
    pub block_type: String,
    /// User-editable configuration
    #[serde(default)]
    pub config: serde_json::Value,
    /// Values for input ports that are not connected
    #[serde(default)]
    pub static_inputs: HashMap<PortId, serde_json::Value>,
    /// Most recent successful result per output port
    #[serde(default)]
    pub outputs: HashMap<PortId, serde_json::Value>,
    /// Execution state, mutated only by the executor
    #[serde(default)]
    pub state: ExecutionState,
    /// Message recorded by the last failed execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BlockInstance {
    /// Create an idle instance with an empty configuration
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            config: serde_json::Value::Object(serde_json::Map::new()),
            static_inputs: HashMap::new(),
            outputs: HashMap::new(),
            state: ExecutionState::Idle,
            error: None,
        }
    }

    /// Create an instance configured with the definition's default config
    pub fn from_definition(id: impl Into<String>, definition: &BlockDefinition) -> Self {
        let mut instance = Self::new(id, definition.block_type.clone());
        if let Some(config) = &definition.default_config {
            instance.config = config.clone();
        }
        instance
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_static_input(mut self, port: impl Into<String>, value: serde_json::Value) -> Self {
        self.static_inputs.insert(port.into(), value);
        self
    }

    /// Return to idle and forget outputs and errors
    pub fn reset(&mut self) {
        self.state = ExecutionState::Idle;
        self.outputs.clear();
        self.error = None;
    }
}

/// One end of a connector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorEndpoint {
    pub instance_id: InstanceId,
    pub port_id: PortId,
}

impl ConnectorEndpoint {
    pub fn new(instance_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            port_id: port_id.into(),
        }
    }
}

/// A connector object owned by the external scene
///
/// Either endpoint may be missing while the user is still drawing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: ConnectorId,
    #[serde(default)]
    pub source: Option<ConnectorEndpoint>,
    #[serde(default)]
    pub target: Option<ConnectorEndpoint>,
}

impl Connector {
    /// Create a connector with both endpoints attached
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: Some(ConnectorEndpoint::new(source, source_port)),
            target: Some(ConnectorEndpoint::new(target, target_port)),
        }
    }

    /// Create a connector that is only attached at its source
    pub fn dangling(id: impl Into<String>, source: impl Into<String>, source_port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Some(ConnectorEndpoint::new(source, source_port)),
            target: None,
        }
    }
}

/// A resolved, directed port-to-port connection between two instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// The connector backing this binding
    pub connector_id: ConnectorId,
    pub source_instance: InstanceId,
    pub source_port: PortId,
    pub target_instance: InstanceId,
    pub target_port: PortId,
}
