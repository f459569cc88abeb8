//! Common types for LLM interactions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message in conversation
///
/// The ordered list of these is the literal request payload, so equality is
/// structural and ordering matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Function the model may call instead of answering in text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    /// High-level step the request belongs to (e.g. `development_planning`)
    pub step: String,
    pub functions: Vec<FunctionDefinition>,
}

/// A structured function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Raw model response, as returned by the backend and as persisted in a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmResponse {
    Text {
        text: String,
    },
    FunctionCall {
        function_calls: FunctionCall,
    },
    /// Out-of-band termination marker for multi-turn loops
    End,
    /// The backend produced nothing usable
    Empty,
}

impl LlmResponse {
    pub fn text(s: impl Into<String>) -> Self {
        LlmResponse::Text { text: s.into() }
    }

    pub fn function_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        LlmResponse::FunctionCall {
            function_calls: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LlmResponse::Empty)
    }
}
