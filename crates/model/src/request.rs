use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Message};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The input messages.
    pub messages: Vec<Message>,
    /// Generation options.
    #[serde(default)]
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Creates a request from messages with default options.
    #[inline]
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            options: ChatOptions::default(),
        }
    }

    /// Replaces the options.
    #[inline]
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks the messages and the options.
    pub fn validate(&self) -> Result<(), Error> {
        if self.messages.is_empty() {
            return Err(Error::invalid_request("at least one message is required"));
        }
        for (i, msg) in self.messages.iter().enumerate() {
            msg.validate().map_err(|err| {
                Error::invalid_request(format!("message {i}: {}", err.message()))
            })?;
        }
        self.options.validate()
    }
}

/// Options supported by most providers.
///
/// Providers silently drop options they don't support, with a warning in
/// the logs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature, generally between 0 and 2.
    pub temperature: Option<f64>,
    /// Nucleus sampling, between 0 and 1.
    pub top_p: Option<f64>,
    /// Only sample among the K most likely tokens.
    pub top_k: Option<u32>,
    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u64>,
    /// Seed for deterministic sampling.
    pub seed: Option<u64>,
    /// The system prompt.
    pub system_prompt: Option<String>,
    /// Sequences that stop the generation.
    #[serde(default)]
    pub stop: Vec<String>,
    /// Tools the model may call.
    #[serde(default)]
    pub tools: Vec<ToolDef>,
    /// Whether the model must call a tool.
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

impl ChatOptions {
    /// Checks the ranges of the options.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=100.0).contains(&temperature) {
                return Err(Error::invalid_request(
                    "temperature must be in [0, 100]",
                ));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(Error::invalid_request("top_p must be in [0, 1]"));
            }
        }
        if let Some(top_k) = self.top_k {
            if top_k > 1024 {
                return Err(Error::invalid_request(
                    "top_k must be in [0, 1024]",
                ));
            }
        }
        let mut names = HashMap::new();
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(Error::invalid_request(format!(
                    "tool {i}: name is required"
                )));
            }
            if tool.description.is_empty() {
                return Err(Error::invalid_request(format!(
                    "tool {i}: description is required"
                )));
            }
            if let Some(j) = names.insert(tool.name.as_str(), i) {
                return Err(Error::invalid_request(format!(
                    "tool {i}: has name {:?} which is the same as tool {j}",
                    tool.name
                )));
            }
        }
        if self.tools.is_empty() && self.tool_choice == ToolChoice::Required {
            return Err(Error::invalid_request(
                "tool_choice is required but no tools are defined",
            ));
        }
        Ok(())
    }
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDef {
    /// Name of the tool, unique within a request.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool, as a JSON schema.
    pub parameters: Value,
}

/// Whether the model should call tools.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// Tools are described but must not be called.
    None,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ErrorKind, Role};

    fn tool(name: &str) -> ToolDef {
        ToolDef {
            name: name.to_owned(),
            description: "Does things.".to_owned(),
            parameters: json!({ "type": "object" }),
        }
    }

    #[test]
    fn test_validate_request() {
        let req = ChatRequest::new([Message::text(Role::User, "Hi")]);
        assert!(req.validate().is_ok());

        let err = ChatRequest::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_validate_options() {
        let options = ChatOptions {
            top_p: Some(1.5),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ChatOptions {
            tools: vec![tool("shell"), tool("shell")],
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.message().contains("same as tool 0"));

        let options = ChatOptions {
            tool_choice: ToolChoice::Required,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ChatOptions {
            temperature: Some(0.7),
            tools: vec![tool("shell")],
            tool_choice: ToolChoice::Required,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }
}
