use std::fmt::{self, Display, Formatter};

use mime::Mime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// The author of a message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The system instructions.
    System,
    /// The user.
    User,
    /// The model.
    Assistant,
    /// A tool replying to a tool call.
    Tool,
}

impl Role {
    /// Parses a normalized role marker as reported in a stream chunk.
    ///
    /// An empty marker means the chunk didn't declare a role and returns
    /// `None`. Any marker outside of the known roles is a protocol error,
    /// since it usually means the provider changed its contract.
    pub fn from_marker(marker: &str) -> Result<Option<Self>, Error> {
        match marker {
            "" => Ok(None),
            "system" => Ok(Some(Role::System)),
            "user" => Ok(Some(Role::User)),
            "assistant" => Ok(Some(Role::Assistant)),
            "tool" => Ok(Some(Role::Tool)),
            _ => Err(Error::protocol(format!("unexpected role {marker:?}"))),
        }
    }

    /// Returns the marker string of this role.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// The author of the message.
    pub role: Role,
    /// Ordered content parts.
    pub contents: Vec<Content>,
}

impl Message {
    /// Creates a message with a single text part.
    #[inline]
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            contents: vec![Content::Text(text.into())],
        }
    }

    /// Concatenates all the text parts, separated by new lines.
    pub fn as_text(&self) -> String {
        let texts: Vec<&str> = self
            .contents
            .iter()
            .filter_map(|c| match c {
                Content::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        texts.join("\n")
    }

    /// Returns the tool calls requested in this message, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.contents.iter().filter_map(|c| match c {
            Content::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    /// Checks that the message can be sent to a provider.
    pub fn validate(&self) -> Result<(), Error> {
        if self.contents.is_empty() {
            return Err(Error::invalid_request(
                "message must have at least one content",
            ));
        }
        for (i, content) in self.contents.iter().enumerate() {
            match content {
                Content::Text(_) => {}
                Content::Document(doc) => {
                    let is_empty = match &doc.source {
                        DocumentSource::Url(url) => url.is_empty(),
                        DocumentSource::Bytes(bytes) => bytes.is_empty(),
                    };
                    if is_empty {
                        return Err(Error::invalid_request(format!(
                            "content {i}: document has no data"
                        )));
                    }
                }
                Content::ToolCall(call) => {
                    if self.role != Role::Assistant {
                        return Err(Error::invalid_request(format!(
                            "content {i}: only the assistant can call tools"
                        )));
                    }
                    if call.name.is_empty() {
                        return Err(Error::invalid_request(format!(
                            "content {i}: tool call name is required"
                        )));
                    }
                }
                Content::ToolCallResult(result) => {
                    if !matches!(self.role, Role::User | Role::Tool) {
                        return Err(Error::invalid_request(format!(
                            "content {i}: only the user or a tool can provide \
                             tool results"
                        )));
                    }
                    if result.id.is_empty() {
                        return Err(Error::invalid_request(format!(
                            "content {i}: tool result id is required"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A part of a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Content {
    /// A text block.
    Text(String),
    /// A document, either inline bytes or a reference.
    Document(Document),
    /// A tool call requested by the model.
    ToolCall(ToolCall),
    /// The result of a tool call.
    ToolCallResult(ToolCallResult),
}

/// A document attached to a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    /// The file name, mostly relevant for its extension.
    pub filename: Option<String>,
    /// Where the document data lives.
    pub source: DocumentSource,
}

impl Document {
    /// Guesses the mime type from the file name, or from the URL when there
    /// is no file name.
    pub fn mime_type(&self) -> Option<Mime> {
        let name = match (&self.filename, &self.source) {
            (Some(filename), _) => filename.as_str(),
            (None, DocumentSource::Url(url)) => {
                url.split(['?', '#']).next().unwrap_or_default()
            }
            (None, DocumentSource::Bytes(_)) => return None,
        };
        let (_, ext) = name.rsplit_once('.')?;
        mime_from_extension(&ext.to_ascii_lowercase())
    }
}

fn mime_from_extension(ext: &str) -> Option<Mime> {
    let essence = match ext {
        "png" => return Some(mime::IMAGE_PNG),
        "jpg" | "jpeg" => return Some(mime::IMAGE_JPEG),
        "gif" => return Some(mime::IMAGE_GIF),
        "pdf" => return Some(mime::APPLICATION_PDF),
        "txt" => return Some(mime::TEXT_PLAIN),
        "json" => return Some(mime::APPLICATION_JSON),
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => return Some(mime::TEXT_HTML),
        _ => return None,
    };
    essence.parse().ok()
}

/// The data of a [`Document`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Inline bytes.
    Bytes(Vec<u8>),
    /// A URL the provider can fetch.
    Url(String),
}

/// Describes a tool call request from the model.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ToolCall {
    /// The identifier of the call, may be assigned by the provider.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments, as JSON text.
    pub arguments: String,
}

impl ToolCall {
    /// Parses the arguments as a JSON value.
    ///
    /// Empty arguments are treated as an empty object.
    pub fn arguments_value(&self) -> Result<Value, Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments).map_err(|err| {
            Error::decode(format!(
                "tool call {:?} has invalid arguments: {err}",
                self.name
            ))
        })
    }
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The identifier of the tool call this replies to.
    pub id: String,
    /// The name of the tool that was called.
    pub name: String,
    /// The result, as JSON text.
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_role_marker() {
        assert_eq!(Role::from_marker("").unwrap(), None);
        assert_eq!(
            Role::from_marker("assistant").unwrap(),
            Some(Role::Assistant)
        );
        assert_eq!(Role::from_marker("tool").unwrap(), Some(Role::Tool));
        let err = Role::from_marker("tool_result_unexpected").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_as_text() {
        let msg = Message {
            role: Role::Assistant,
            contents: vec![
                Content::Text("Hello".to_owned()),
                Content::ToolCall(ToolCall {
                    id: "1".to_owned(),
                    name: "get_weather".to_owned(),
                    arguments: "{}".to_owned(),
                }),
                Content::Text("world".to_owned()),
            ],
        };
        assert_eq!(msg.as_text(), "Hello\nworld");
        assert_eq!(msg.tool_calls().count(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(Message::text(Role::User, "Hi").validate().is_ok());

        let empty = Message {
            role: Role::User,
            contents: vec![],
        };
        assert!(empty.validate().is_err());

        let user_calls_tool = Message {
            role: Role::User,
            contents: vec![Content::ToolCall(ToolCall {
                id: "1".to_owned(),
                name: "shell".to_owned(),
                arguments: String::new(),
            })],
        };
        let err = user_calls_tool.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_arguments_value() {
        let call = ToolCall {
            id: "1".to_owned(),
            name: "add".to_owned(),
            arguments: r#"{"a":1}"#.to_owned(),
        };
        assert_eq!(call.arguments_value().unwrap(), serde_json::json!({"a": 1}));

        let call = ToolCall {
            arguments: String::new(),
            ..call
        };
        assert_eq!(call.arguments_value().unwrap(), serde_json::json!({}));

        let call = ToolCall {
            arguments: r#"{"a":"#.to_owned(),
            ..call
        };
        assert_eq!(call.arguments_value().unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_mime_type() {
        let doc = Document {
            filename: Some("cat.PNG".to_owned()),
            source: DocumentSource::Bytes(vec![1, 2, 3]),
        };
        assert_eq!(doc.mime_type(), Some(mime::IMAGE_PNG));

        let doc = Document {
            filename: None,
            source: DocumentSource::Url(
                "https://example.com/a/report.pdf?dl=1".to_owned(),
            ),
        };
        assert_eq!(doc.mime_type(), Some(mime::APPLICATION_PDF));

        let doc = Document {
            filename: None,
            source: DocumentSource::Bytes(vec![]),
        };
        assert_eq!(doc.mime_type(), None);
    }
}
