//! Tool-use records.
//!
//! A [`ToolCall`] exists only within one loop iteration: it correlates a
//! model's tool-use request with the result fed back into the transcript.

use crate::message::MessageToolCall;
use serde::{Deserialize, Serialize};

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation ID (matches the model's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Decode the arguments carried on an assistant message.
    ///
    /// Arguments that are not valid JSON become `Null`, which the
    /// dispatcher then rejects as invalid arguments for the named tool.
    pub fn from_message(call: &MessageToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: serde_json::from_str(&call.arguments).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_arguments() {
        let call = ToolCall::from_message(&MessageToolCall {
            id: "toolu_1".into(),
            name: "read_file".into(),
            arguments: r#"{"path":"src/lib.rs"}"#.into(),
        });
        assert_eq!(call.id, "toolu_1");
        assert_eq!(call.arguments["path"], "src/lib.rs");
    }

    #[test]
    fn malformed_arguments_become_null() {
        let call = ToolCall::from_message(&MessageToolCall {
            id: "toolu_2".into(),
            name: "write_file".into(),
            arguments: "{not json".into(),
        });
        assert!(call.arguments.is_null());
    }
}
