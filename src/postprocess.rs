//! Turning a raw model response into a turn result
//!
//! A response either asks for a function call, which is dispatched to a
//! handler from the caller's [`FunctionCalls`], or carries text. Handlers can
//! be given temporary access to the conversation through [`HandlerScope`];
//! the borrow ends when the handler returns.

use crate::conversation::Conversation;
use crate::error::{ConvoError, ConvoResult};
use crate::llm::{FunctionDefinition, LlmResponse};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Transcript text written for the termination marker
pub const END_RESPONSE_TEXT: &str = "EVERYTHING_CLEAR";

/// Post-processed result of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    /// Function handler result, or a function call nobody was asked to handle
    Value(Value),
    /// The model signalled the end of a multi-turn exchange
    End,
}

impl Reply {
    pub fn is_end(&self) -> bool {
        matches!(self, Reply::End)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Value(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

/// Access handed to a function handler for the duration of one call
pub struct HandlerScope<'a> {
    convo: Option<&'a mut Conversation>,
}

impl HandlerScope<'_> {
    /// The live conversation, if the capability map asked for it
    pub fn conversation(&mut self) -> Option<&mut Conversation> {
        self.convo.as_deref_mut()
    }
}

pub type FunctionHandler =
    Box<dyn Fn(&mut HandlerScope<'_>, Map<String, Value>) -> Result<Value, String> + Send + Sync>;

pub type MessageFormatter = Box<dyn Fn(&[Value]) -> String + Send + Sync>;

/// Capability map: functions offered to the model and their handlers
#[derive(Default)]
pub struct FunctionCalls {
    definitions: Vec<FunctionDefinition>,
    handlers: HashMap<String, FunctionHandler>,
    send_convo: bool,
    to_message: Option<MessageFormatter>,
}

impl FunctionCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `definition` to the model and handle calls to it with `handler`
    #[must_use]
    pub fn with_function<F>(mut self, definition: FunctionDefinition, handler: F) -> Self
    where
        F: Fn(&mut HandlerScope<'_>, Map<String, Value>) -> Result<Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(definition.name.clone(), Box::new(handler));
        self.definitions.push(definition);
        self
    }

    /// Handle calls to `name` without advertising a definition
    #[must_use]
    pub fn with_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut HandlerScope<'_>, Map<String, Value>) -> Result<Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    /// Give handlers access to the conversation
    #[must_use]
    pub fn send_convo(mut self) -> Self {
        self.send_convo = true;
        self
    }

    /// Format list results with `formatter` instead of the default rendering
    #[must_use]
    pub fn to_message<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        self.to_message = Some(Box::new(formatter));
        self
    }

    pub fn definitions(&self) -> &[FunctionDefinition] {
        &self.definitions
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl fmt::Debug for FunctionCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("FunctionCalls")
            .field("handlers", &names)
            .field("send_convo", &self.send_convo)
            .field("to_message", &self.to_message.is_some())
            .finish_non_exhaustive()
    }
}

/// Interpret `response`, dispatching function calls when `functions` is given
pub fn postprocess(
    response: LlmResponse,
    functions: Option<&FunctionCalls>,
    convo: &mut Conversation,
) -> ConvoResult<Reply> {
    match (response, functions) {
        (LlmResponse::FunctionCall { function_calls }, Some(functions)) => {
            let name = function_calls.name;
            let handler = functions
                .handlers
                .get(&name)
                .ok_or_else(|| ConvoError::UnknownFunctionRequested(name.clone()))?;
            let mut scope = HandlerScope {
                convo: functions.send_convo.then_some(convo),
            };
            tracing::debug!(function = %name, "Dispatching function call");
            handler(&mut scope, function_calls.arguments)
                .map(Reply::Value)
                .map_err(|message| ConvoError::Handler { name, message })
        }
        (LlmResponse::FunctionCall { function_calls }, None) => Ok(Reply::Value(json!({
            "function_calls": {
                "name": function_calls.name,
                "arguments": function_calls.arguments,
            }
        }))),
        (LlmResponse::Text { text }, _) => Ok(Reply::Text(text)),
        (LlmResponse::End, _) => Ok(Reply::End),
        (LlmResponse::Empty, _) => Err(ConvoError::Backend(
            "LLM returned an empty response".to_string(),
        )),
    }
}

/// Assistant message text for a reply
pub fn render_reply(reply: &Reply, functions: Option<&FunctionCalls>) -> String {
    match reply {
        Reply::Text(text) => text.clone(),
        Reply::End => END_RESPONSE_TEXT.to_string(),
        Reply::Value(Value::Array(items)) => {
            if let Some(formatter) = functions.and_then(|f| f.to_message.as_ref()) {
                formatter(items)
            } else if items.first().is_some_and(Value::is_object) {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("#{i}\n{}", object_to_string(item)))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                items
                    .iter()
                    .map(|item| format!("- {}", scalar_to_string(item)))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Reply::Value(value) => scalar_to_string(value),
    }
}

fn object_to_string(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| format!("{key}: {}", scalar_to_string(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar_to_string(other),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
