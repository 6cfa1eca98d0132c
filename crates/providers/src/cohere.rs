//! Cohere chat, API v2.
//!
//! Cohere streams typed events rather than message deltas. Each event is
//! framed with an `event:` line followed by its `data:` line, and the JSON
//! payload repeats the type in its `type` field.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use genai_relay_model::{
    Adapter, ChatRequest, Chunk, Content, DecodePolicy, Delta, DocumentSource,
    Error, FinishReason, Framing, Model, Role, ToolCallDelta, ToolChoice,
    Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{self, ApiError, Extra, UnknownFields, VendorError};
use crate::openai_compat::{RequestFunctionCall, RequestTool, RequestToolCall};

/// The Cohere API.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cohere;

impl Adapter for Cohere {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.cohere.com"
    }

    fn chat_url(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{base_url}/v2/chat")
    }

    fn models_url(&self, base_url: &str) -> Option<String> {
        Some(format!("{base_url}/v1/models?page_size=1000"))
    }

    fn build_request(
        &self,
        req: &ChatRequest,
        model: &str,
        stream: bool,
    ) -> Result<Value, Error> {
        let options = &req.options;
        let body = ChatRequestBody {
            model,
            stream,
            messages: build_messages(req)?,
            max_tokens: options.max_tokens,
            stop_sequences: options.stop.clone(),
            temperature: options.temperature,
            seed: options.seed,
            k: options.top_k,
            p: options.top_p,
            tools: options.tools.iter().map(RequestTool::from).collect(),
            tool_choice: match options.tool_choice {
                _ if options.tools.is_empty() => None,
                ToolChoice::Auto => None,
                ToolChoice::Required => Some("REQUIRED"),
                ToolChoice::None => Some("NONE"),
            },
        };
        serde_json::to_value(body)
            .map_err(|err| Error::invalid_request(err.to_string()))
    }

    #[inline]
    fn framing(&self) -> Framing {
        Framing {
            ignore_event_lines: true,
        }
    }

    fn decode_chunk(
        &self,
        payload: &str,
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let event: StreamEvent = decode::vendor_payload(
            self.name(),
            payload.as_bytes(),
            policy,
            "event",
        )?;
        event.into_chunk(policy)
    }

    fn decode_response(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let resp: ChatResponse = decode::from_slice(body, policy, "response")?;
        Ok(resp.into_chunk())
    }

    fn decode_models(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Vec<Model>, Error> {
        let list: ModelList = decode::from_slice(body, policy, "models")?;
        Ok(list
            .models
            .into_iter()
            .map(|m| Model {
                id: m.name,
                description: None,
                context_length: m.context_length,
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
struct RequestMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    content: Vec<RequestPart>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<RequestToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

fn build_messages(req: &ChatRequest) -> Result<Vec<RequestMessage>, Error> {
    let mut out = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system_prompt) = &req.options.system_prompt {
        out.push(RequestMessage {
            role: "system",
            content: vec![RequestPart::Text {
                text: system_prompt.clone(),
            }],
            ..Default::default()
        });
    }

    for (i, msg) in req.messages.iter().enumerate() {
        let mut content = Vec::new();
        let mut tool_calls = Vec::new();
        for part in &msg.contents {
            match part {
                Content::Text(text) => {
                    content.push(RequestPart::Text { text: text.clone() });
                }
                Content::Document(doc) => {
                    let mime = doc.mime_type().filter(|m| m.type_() == "image");
                    let url = match (&doc.source, mime) {
                        (DocumentSource::Url(url), _) => url.clone(),
                        (DocumentSource::Bytes(data), Some(mime)) => format!(
                            "data:{};base64,{}",
                            mime.essence_str(),
                            STANDARD.encode(data)
                        ),
                        (DocumentSource::Bytes(_), None) => {
                            return Err(Error::unsupported(format!(
                                "message {i}: cohere only accepts images"
                            )));
                        }
                    };
                    content.push(RequestPart::ImageUrl {
                        image_url: ImageUrl { url },
                    });
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
                        content: vec![RequestPart::Text {
                            text: result.result.clone(),
                        }],
                        tool_call_id: Some(result.id.clone()),
                        ..Default::default()
                    });
                }
            }
        }
        if content.is_empty() && tool_calls.is_empty() {
            continue;
        }
        let role = match msg.role {
            // Tool messages only carry results, handled above.
            Role::Tool => "user",
            role => role.as_str(),
        };
        out.push(RequestMessage {
            role,
            content,
            tool_calls,
            ..Default::default()
        });
    }
    Ok(out)
}

/// Either a single object or a list of them. Cohere sends content and
/// tool calls as a list in `message-start` and as an object afterwards.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

impl<T: UnknownFields> UnknownFields for OneOrMany<T> {
    fn collect_unknown(&self, path: &str, out: &mut Vec<String>) {
        match self {
            OneOrMany::One(one) => one.collect_unknown(path, out),
            OneOrMany::Many(many) => many.collect_unknown(path, out),
        }
    }
}

const EVENT_TYPES: &[&str] = &[
    "message-start",
    "content-start",
    "content-delta",
    "content-end",
    "tool-plan-delta",
    "tool-call-start",
    "tool-call-delta",
    "tool-call-end",
    "citation-start",
    "citation-end",
    "message-end",
    "debug",
];

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(StreamEvent { delta }, known = ["id"]);

impl VendorError for StreamEvent {
    fn vendor_error(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.message());
        }
        let delta = self.delta.as_ref()?;
        if let Some(error) = &delta.error {
            return Some(error.message());
        }
        match delta.finish_reason.as_deref() {
            Some("ERROR") => Some("generation failed".to_owned()),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventDelta {
    #[serde(default)]
    message: Option<EventMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(EventDelta { message, usage });

#[derive(Debug, Default, Deserialize)]
struct EventMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<OneOrMany<ContentPart>>,
    #[serde(default)]
    tool_calls: Option<OneOrMany<ApiToolCall>>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    EventMessage { content, tool_calls },
    known = ["tool_plan", "citations"]
);

#[derive(Debug, Default, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ContentPart {}, known = ["type"]);

#[derive(Debug, Default, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ApiFunctionCall>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ApiToolCall { function }, known = ["type"]);

#[derive(Debug, Default, Deserialize)]
struct ApiFunctionCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ApiFunctionCall {});

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    tokens: Option<TokenCounts>,
    #[serde(default)]
    billed_units: Option<TokenCounts>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ApiUsage { tokens, billed_units }, known = ["cached_tokens"]);

#[derive(Debug, Default, Deserialize)]
struct TokenCounts {
    #[serde(default)]
    input_tokens: f64,
    #[serde(default)]
    output_tokens: f64,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    TokenCounts {},
    known = ["search_units", "classifications", "image_tokens"]
);

impl ApiUsage {
    /// Prefers the actual token counts, falling back to billed units.
    fn to_usage(&self) -> Usage {
        let counts = match (&self.tokens, &self.billed_units) {
            (Some(tokens), _) => tokens,
            (None, Some(billed)) => billed,
            (None, None) => return Usage::default(),
        };
        Usage::tokens(
            counts.input_tokens as u64,
            counts.output_tokens as u64,
        )
    }
}

impl ApiToolCall {
    fn into_delta(self, index: Option<u32>) -> ToolCallDelta {
        let function = self.function.unwrap_or_default();
        ToolCallDelta {
            index,
            id: self.id,
            name: function.name,
            arguments: function.arguments.unwrap_or_default(),
        }
    }
}

impl StreamEvent {
    fn into_chunk(self, policy: DecodePolicy) -> Result<Chunk, Error> {
        if !EVENT_TYPES.contains(&self.r#type.as_str()) {
            return match policy {
                DecodePolicy::Strict => Err(Error::decode(format!(
                    "unknown event type {:?}",
                    self.r#type
                ))),
                DecodePolicy::Lenient => {
                    warn!("ignoring unknown event type {:?}", self.r#type);
                    Ok(Chunk::default())
                }
            };
        }

        let delta = self.delta.unwrap_or_default();
        let message = delta.message.unwrap_or_default();
        let chunk = match self.r#type.as_str() {
            "message-start" => Chunk::single(Delta::with_role(
                message.role.unwrap_or_default(),
            )),
            "content-start" | "content-delta" => {
                let mut out = Delta::default();
                for part in message.content.map(OneOrMany::into_vec).unwrap_or_default() {
                    match part.text {
                        Some(text) if !text.is_empty() => out = out.text(text),
                        _ => {}
                    }
                }
                Chunk::single(out)
            }
            "tool-call-start" | "tool-call-delta" => {
                let mut out = Delta::default();
                let calls = message
                    .tool_calls
                    .map(OneOrMany::into_vec)
                    .unwrap_or_default();
                for call in calls {
                    out = out.tool_call(call.into_delta(self.index));
                }
                Chunk::single(out)
            }
            "message-end" => {
                let mut out = Delta::default();
                out.finish_reason = delta
                    .finish_reason
                    .as_deref()
                    .and_then(FinishReason::from_vendor);
                Chunk {
                    candidates: vec![out],
                    usage: delta.usage.as_ref().map(ApiUsage::to_usage),
                }
            }
            // Events that carry nothing for the reply.
            _ => Chunk::default(),
        };
        Ok(chunk)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    finish_reason: Option<String>,
    message: ResponseMessage,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    ChatResponse { message, usage },
    known = ["id", "logprobs"]
);

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    ResponseMessage { content, tool_calls },
    known = ["tool_plan", "citations"]
);

impl ChatResponse {
    fn into_chunk(self) -> Chunk {
        let message = self.message;
        let mut out = Delta::with_role(message.role.unwrap_or_default());
        for part in message.content {
            if let Some(text) = part.text {
                out = out.text(text);
            }
        }
        for call in message.tool_calls {
            out = out.tool_call(call.into_delta(None));
        }
        out.finish_reason = self
            .finish_reason
            .as_deref()
            .and_then(FinishReason::from_vendor);
        Chunk {
            candidates: vec![out],
            usage: self.usage.as_ref().map(ApiUsage::to_usage),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ApiModel>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ModelList { models }, known = ["next_page_token"]);

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    ApiModel {},
    known = [
        "endpoints",
        "features",
        "finetuned",
        "tokenizer_url",
        "supports_vision",
        "default_endpoints",
        "is_deprecated",
        "sampling_defaults",
    ]
);

#[cfg(test)]
mod tests {
    use genai_relay_model::{
        ChatOptions, Document, ErrorKind, Message, ToolCall, ToolCallResult,
        ToolDef,
    };
    use serde_json::json;

    use super::*;

    fn decode(payload: Value) -> Result<Chunk, Error> {
        Cohere.decode_chunk(&payload.to_string(), DecodePolicy::Strict)
    }

    #[test]
    fn test_build_request() {
        let req = ChatRequest::new([
            Message {
                role: Role::User,
                contents: vec![
                    Content::Text("Describe this.".to_owned()),
                    Content::Document(Document {
                        filename: None,
                        source: DocumentSource::Url(
                            "https://example.com/cat.jpg".to_owned(),
                        ),
                    }),
                ],
            },
            Message {
                role: Role::Assistant,
                contents: vec![Content::ToolCall(ToolCall {
                    id: "c1".to_owned(),
                    name: "lookup".to_owned(),
                    arguments: "{}".to_owned(),
                })],
            },
            Message {
                role: Role::Tool,
                contents: vec![Content::ToolCallResult(ToolCallResult {
                    id: "c1".to_owned(),
                    name: "lookup".to_owned(),
                    result: "a cat".to_owned(),
                })],
            },
        ])
        .with_options(ChatOptions {
            system_prompt: Some("Be helpful.".to_owned()),
            top_k: Some(40),
            top_p: Some(0.5),
            seed: Some(3),
            stop: vec!["END".to_owned()],
            tools: vec![ToolDef {
                name: "lookup".to_owned(),
                description: "Looks things up.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
            tool_choice: ToolChoice::Required,
            ..Default::default()
        });

        let body = Cohere.build_request(&req, "command-r", true).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "command-r",
                "stream": true,
                "stop_sequences": ["END"],
                "seed": 3,
                "k": 40,
                "p": 0.5,
                "messages": [
                    {
                        "role": "system",
                        "content": [{ "type": "text", "text": "Be helpful." }]
                    },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text", "text": "Describe this." },
                            {
                                "type": "image_url",
                                "image_url": { "url": "https://example.com/cat.jpg" }
                            }
                        ]
                    },
                    {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "c1",
                            "type": "function",
                            "function": { "name": "lookup", "arguments": "{}" }
                        }]
                    },
                    {
                        "role": "tool",
                        "content": [{ "type": "text", "text": "a cat" }],
                        "tool_call_id": "c1"
                    }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "lookup",
                        "description": "Looks things up.",
                        "parameters": { "type": "object" }
                    }
                }],
                "tool_choice": "REQUIRED"
            })
        );
    }

    #[test]
    fn test_framing() {
        assert!(Cohere.framing().ignore_event_lines);
    }

    #[test]
    fn test_decode_text_events() {
        let chunk = decode(json!({
            "id": "m1",
            "type": "message-start",
            "delta": {
                "message": {
                    "role": "assistant",
                    "content": [],
                    "tool_plan": "",
                    "tool_calls": [],
                    "citations": []
                }
            }
        }))
        .unwrap();
        assert_eq!(chunk, Chunk::single(Delta::with_role("assistant")));

        let chunk = decode(json!({
            "type": "content-start",
            "index": 0,
            "delta": { "message": { "content": { "type": "text", "text": "" } } }
        }))
        .unwrap();
        assert_eq!(chunk, Chunk::single(Delta::default()));

        let chunk = decode(json!({
            "type": "content-delta",
            "index": 0,
            "delta": { "message": { "content": { "text": "Hello" } } }
        }))
        .unwrap();
        assert_eq!(chunk, Chunk::single(Delta::default().text("Hello")));

        let chunk = decode(json!({ "type": "content-end", "index": 0 })).unwrap();
        assert!(chunk.candidates.is_empty());
    }

    #[test]
    fn test_decode_tool_call_events() {
        let chunk = decode(json!({
            "type": "tool-call-start",
            "index": 1,
            "delta": {
                "message": {
                    "tool_calls": {
                        "id": "lookup_x1",
                        "type": "function",
                        "function": { "name": "lookup", "arguments": "" }
                    }
                }
            }
        }))
        .unwrap();
        assert_eq!(
            chunk,
            Chunk::single(Delta::default().tool_call(ToolCallDelta {
                index: Some(1),
                id: Some("lookup_x1".to_owned()),
                name: Some("lookup".to_owned()),
                arguments: String::new(),
            }))
        );

        let chunk = decode(json!({
            "type": "tool-call-delta",
            "index": 1,
            "delta": {
                "message": { "tool_calls": { "function": { "arguments": "{\"q\":" } } }
            }
        }))
        .unwrap();
        assert_eq!(
            chunk,
            Chunk::single(Delta::default().tool_call(ToolCallDelta {
                index: Some(1),
                arguments: "{\"q\":".to_owned(),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn test_decode_message_end() {
        let chunk = decode(json!({
            "type": "message-end",
            "delta": {
                "finish_reason": "COMPLETE",
                "usage": {
                    "billed_units": { "input_tokens": 6, "output_tokens": 2 },
                    "tokens": { "input_tokens": 70, "output_tokens": 2 }
                }
            }
        }))
        .unwrap();
        assert_eq!(
            chunk,
            Chunk::single(Delta::default().finish(FinishReason::Stop))
                .with_usage(Usage::tokens(70, 2))
        );
    }

    #[test]
    fn test_message_end_error() {
        let payload = json!({
            "type": "message-end",
            "delta": {
                "error": "model overloaded, please retry",
                "finish_reason": "ERROR",
                "usage": { "tokens": { "input_tokens": 5, "output_tokens": 1 } }
            }
        })
        .to_string();
        for policy in [DecodePolicy::Strict, DecodePolicy::Lenient] {
            let err = Cohere.decode_chunk(&payload, policy).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transport);
            assert_eq!(err.message(), "cohere: model overloaded, please retry");
        }

        let payload = json!({
            "type": "message-end",
            "delta": { "finish_reason": "ERROR" }
        })
        .to_string();
        let err = Cohere
            .decode_chunk(&payload, DecodePolicy::Lenient)
            .unwrap_err();
        assert_eq!(err.message(), "cohere: generation failed");
    }

    #[test]
    fn test_unknown_event_type() {
        let payload = json!({ "type": "sparkle" }).to_string();
        let err = Cohere
            .decode_chunk(&payload, DecodePolicy::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let chunk = Cohere
            .decode_chunk(&payload, DecodePolicy::Lenient)
            .unwrap();
        assert_eq!(chunk, Chunk::default());
    }

    #[test]
    fn test_decode_response() {
        let body = json!({
            "id": "r1",
            "finish_reason": "TOOL_CALL",
            "message": {
                "role": "assistant",
                "tool_plan": "I will look it up.",
                "tool_calls": [{
                    "id": "lookup_1",
                    "type": "function",
                    "function": { "name": "lookup", "arguments": "{\"q\":\"cat\"}" }
                }]
            },
            "usage": { "billed_units": { "input_tokens": 9, "output_tokens": 4 } }
        })
        .to_string();
        let chunk = Cohere
            .decode_response(body.as_bytes(), DecodePolicy::Strict)
            .unwrap();
        assert_eq!(
            chunk,
            Chunk::single(
                Delta::with_role("assistant")
                    .tool_call(ToolCallDelta {
                        index: None,
                        id: Some("lookup_1".to_owned()),
                        name: Some("lookup".to_owned()),
                        arguments: "{\"q\":\"cat\"}".to_owned(),
                    })
                    .finish(FinishReason::ToolCalls)
            )
            .with_usage(Usage::tokens(9, 4))
        );
    }

    #[test]
    fn test_decode_models() {
        let body = json!({
            "models": [{
                "name": "command-r",
                "endpoints": ["generate", "chat"],
                "finetuned": false,
                "context_length": 128_000,
                "tokenizer_url": "https://example.com/tokenizer.json",
                "default_endpoints": [],
                "features": ["tools"]
            }],
            "next_page_token": ""
        })
        .to_string();
        let models = Cohere
            .decode_models(body.as_bytes(), DecodePolicy::Strict)
            .unwrap();
        assert_eq!(
            models,
            [Model {
                id: "command-r".to_owned(),
                description: None,
                context_length: Some(128_000),
            }]
        );
        assert_eq!(
            Cohere.models_url("https://api.cohere.com").as_deref(),
            Some("https://api.cohere.com/v1/models?page_size=1000")
        );
    }
}
