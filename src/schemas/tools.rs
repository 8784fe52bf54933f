use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A caller-defined function the model may ask to invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl FunctionDefinition {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// How the model is allowed to pick among the supplied functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionCallBehavior {
    None,
    Auto,
    /// The model must call one of the functions.
    Any,
    /// The model must call the named function.
    Named(String),
}
