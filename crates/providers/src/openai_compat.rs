//! Wire shapes shared by vendors exposing an OpenAI-style chat API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use genai_relay_model::{
    ChatRequest, Chunk, Content, Delta, DocumentSource, Error, FinishReason,
    Model, ToolCallDelta, ToolChoice, ToolDef, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{ApiError, Extra, UnknownFields, VendorError};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequestBody<'a> {
    pub model: &'a str,
    pub messages: Vec<RequestMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<RequestTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct RequestMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<RequestContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<RequestToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum RequestContent {
    Text(String),
    Parts(Vec<RequestPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum RequestPart {
    Text { text: String },
    ImageUrl { image_url: String },
    DocumentUrl { document_url: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestToolCall {
    pub id: String,
    pub r#type: &'static str,
    pub function: RequestFunctionCall,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestTool {
    pub r#type: &'static str,
    pub function: RequestFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDef> for RequestTool {
    fn from(tool: &ToolDef) -> Self {
        Self {
            r#type: "function",
            function: RequestFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

/// How a vendor accepts documents in user messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Documents {
    Unsupported,
    /// Images as `image_url` parts, with inline bytes as data URLs, and
    /// other documents as `document_url` parts.
    Parts,
}

/// Maps the generic messages, prefixed by the system prompt if any.
pub(crate) fn build_messages(
    vendor: &str,
    req: &ChatRequest,
    documents: Documents,
) -> Result<Vec<RequestMessage>, Error> {
    let mut out = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system_prompt) = &req.options.system_prompt {
        out.push(RequestMessage {
            role: "system",
            content: Some(RequestContent::Text(system_prompt.clone())),
            ..Default::default()
        });
    }

    for (i, msg) in req.messages.iter().enumerate() {
        let mut texts = Vec::new();
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        for content in &msg.contents {
            match content {
                Content::Text(text) => {
                    texts.push(text.clone());
                    parts.push(RequestPart::Text { text: text.clone() });
                }
                Content::Document(doc) => {
                    if documents == Documents::Unsupported {
                        return Err(Error::unsupported(format!(
                            "message {i}: {vendor} doesn't support documents"
                        )));
                    }
                    let is_image = doc
                        .mime_type()
                        .is_some_and(|m| m.type_() == "image");
                    let part = match (&doc.source, is_image) {
                        (DocumentSource::Url(url), true) => {
                            RequestPart::ImageUrl {
                                image_url: url.clone(),
                            }
                        }
                        (DocumentSource::Url(url), false) => {
                            RequestPart::DocumentUrl {
                                document_url: url.clone(),
                            }
                        }
                        (DocumentSource::Bytes(data), true) => {
                            let mime = doc
                                .mime_type()
                                .map(|m| m.essence_str().to_owned())
                                .unwrap_or_default();
                            RequestPart::ImageUrl {
                                image_url: format!(
                                    "data:{mime};base64,{}",
                                    STANDARD.encode(data)
                                ),
                            }
                        }
                        (DocumentSource::Bytes(_), false) => {
                            return Err(Error::unsupported(format!(
                                "message {i}: {vendor} only accepts inline \
                                 images"
                            )));
                        }
                    };
                    parts.push(part);
                }
                Content::ToolCall(call) => {
                    tool_calls.push(RequestToolCall {
                        id: call.id.clone(),
                        r#type: "function",
                        function: RequestFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    });
                }
                Content::ToolCallResult(result) => {
                    out.push(RequestMessage {
                        role: "tool",
                        content: Some(RequestContent::Text(
                            result.result.clone(),
                        )),
                        tool_call_id: Some(result.id.clone()),
                        name: Some(result.name.clone()),
                        ..Default::default()
                    });
                }
            }
        }

        let has_documents = parts.len() != texts.len();
        let content = if has_documents {
            Some(RequestContent::Parts(parts))
        } else if texts.is_empty() {
            None
        } else {
            Some(RequestContent::Text(texts.join("\n")))
        };
        if content.is_none() && tool_calls.is_empty() {
            continue;
        }
        out.push(RequestMessage {
            role: msg.role.as_str(),
            content,
            tool_calls,
            ..Default::default()
        });
    }
    Ok(out)
}

/// Maps the tool choice, only meaningful when tools are defined.
pub(crate) fn tool_choice(req: &ChatRequest, required: &'static str) -> Option<&'static str> {
    if req.options.tools.is_empty() {
        return None;
    }
    Some(match req.options.tool_choice {
        ToolChoice::Auto => "auto",
        ToolChoice::Required => required,
        ToolChoice::None => "none",
    })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ChatChunk { choices, usage },
    known = ["id", "object", "created", "model", "system_fingerprint"]
);

/// A complete, non-streamed response. Same as a chunk, except that the
/// choices carry a `message` instead of a `delta`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ChatResponse { choices, usage },
    known = ["id", "object", "created", "model", "system_fingerprint"]
);

impl VendorError for ChatChunk {
    fn vendor_error(&self) -> Option<String> {
        vendor_error(self.error.as_ref(), &self.extra)
    }
}

impl VendorError for ChatResponse {
    fn vendor_error(&self) -> Option<String> {
        vendor_error(self.error.as_ref(), &self.extra)
    }
}

// Either `{"error": {...}}`, or a top-level `{"object": "error", ...}`.
fn vendor_error(error: Option<&ApiError>, extra: &Extra) -> Option<String> {
    if let Some(error) = error {
        return Some(error.message());
    }
    if extra.get("object").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let message = extra.get("message").and_then(Value::as_str);
    Some(message.unwrap_or("unknown error").to_owned())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Choice {
    #[serde(default, alias = "message")]
    pub delta: ApiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(Choice { delta }, known = ["index", "logprobs"]);

/// A message, or a message delta in a stream.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<ApiContent>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ApiMessage { content, tool_calls },
    known = ["reasoning_content", "prefix"]
);

/// Message content is either a plain string or a list of typed chunks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

impl UnknownFields for ApiContent {
    fn collect_unknown(&self, path: &str, out: &mut Vec<String>) {
        if let ApiContent::Parts(parts) = self {
            parts.collect_unknown(path, out);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiContentPart {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ApiContentPart {},
    known = ["image_url", "document_url", "thinking"]
);

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ApiFunctionCall>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(ApiToolCall { function }, known = ["type"]);

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiFunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(ApiFunctionCall {});

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub prompt_cache_hit_tokens: u64,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ApiUsage { prompt_tokens_details },
    known = [
        "total_tokens",
        "prompt_cache_miss_tokens",
        "completion_tokens_details",
    ]
);

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(PromptTokensDetails {});

impl ApiUsage {
    pub(crate) fn to_usage(&self) -> Usage {
        let details_cached = self
            .prompt_tokens_details
            .as_ref()
            .map(|details| details.cached_tokens)
            .unwrap_or_default();
        Usage {
            input_tokens: self.prompt_tokens,
            input_cached_tokens: self
                .prompt_cache_hit_tokens
                .max(details_cached),
            output_tokens: self.completion_tokens,
            finish_reason: None,
        }
    }
}

impl ApiMessage {
    /// Converts to a normalized delta.
    pub(crate) fn into_delta(self, finish_reason: Option<&str>) -> Delta {
        let mut delta = Delta::with_role(self.role.unwrap_or_default());
        match self.content {
            Some(ApiContent::Text(text)) => delta = delta.text(text),
            Some(ApiContent::Parts(parts)) => {
                for part in parts {
                    // Thinking chunks are not part of the reply.
                    if part.r#type == "text" {
                        delta = delta.text(part.text.unwrap_or_default());
                    }
                }
            }
            None => {}
        }
        for call in self.tool_calls.unwrap_or_default() {
            let function = call.function.unwrap_or_default();
            delta = delta.tool_call(ToolCallDelta {
                index: call.index,
                id: call.id,
                name: function.name,
                arguments: function.arguments.unwrap_or_default(),
            });
        }
        delta.finish_reason = finish_reason.and_then(FinishReason::from_vendor);
        delta
    }
}

fn into_chunk(choices: Vec<Choice>, usage: Option<ApiUsage>) -> Chunk {
    Chunk {
        candidates: choices
            .into_iter()
            .map(|c| c.delta.into_delta(c.finish_reason.as_deref()))
            .collect(),
        usage: usage.as_ref().map(ApiUsage::to_usage),
    }
}

impl ChatChunk {
    #[inline]
    pub(crate) fn into_chunk(self) -> Chunk {
        into_chunk(self.choices, self.usage)
    }
}

impl ChatResponse {
    #[inline]
    pub(crate) fn into_chunk(self) -> Chunk {
        into_chunk(self.choices, self.usage)
    }
}

/// The `GET /models` response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ApiModel>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(ModelList { data }, known = ["object"]);

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiModel {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_context_length: Option<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}
unknown_fields!(
    ApiModel {},
    known = [
        "object",
        "created",
        "owned_by",
        "name",
        "capabilities",
        "aliases",
        "deprecation",
        "deprecation_replacement_model",
        "default_model_temperature",
        "type",
    ]
);

impl ModelList {
    pub(crate) fn into_models(self) -> Vec<Model> {
        self.data
            .into_iter()
            .map(|m| Model {
                id: m.id,
                description: m.description.filter(|d| !d.is_empty()),
                context_length: m.max_context_length,
            })
            .collect()
    }
}
