//! Mistral chat completions.

use genai_relay_model::{
    Adapter, ChatRequest, Chunk, DecodePolicy, Error, Model,
};
use serde_json::Value;

use crate::decode;
use crate::openai_compat::{
    ChatChunk, ChatRequestBody, ChatResponse, Documents, ModelList,
    RequestTool, build_messages, tool_choice,
};

/// The Mistral API.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mistral;

impl Adapter for Mistral {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.mistral.ai/v1"
    }

    fn chat_url(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{base_url}/chat/completions")
    }

    fn models_url(&self, base_url: &str) -> Option<String> {
        Some(format!("{base_url}/models"))
    }

    fn build_request(
        &self,
        req: &ChatRequest,
        model: &str,
        stream: bool,
    ) -> Result<Value, Error> {
        let options = &req.options;
        if options.top_k.is_some() {
            warn!("mistral doesn't support top_k, ignoring");
        }
        let body = ChatRequestBody {
            model,
            messages: build_messages(self.name(), req, Documents::Parts)?,
            stream,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            random_seed: options.seed,
            stop: options.stop.clone(),
            tools: options.tools.iter().map(RequestTool::from).collect(),
            tool_choice: tool_choice(req, "any"),
            stream_options: None,
        };
        serde_json::to_value(body)
            .map_err(|err| Error::invalid_request(err.to_string()))
    }

    fn decode_chunk(
        &self,
        payload: &str,
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let chunk: ChatChunk = decode::vendor_payload(
            self.name(),
            payload.as_bytes(),
            policy,
            "chunk",
        )?;
        Ok(chunk.into_chunk())
    }

    fn decode_response(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let resp: ChatResponse =
            decode::vendor_payload(self.name(), body, policy, "response")?;
        Ok(resp.into_chunk())
    }

    fn decode_models(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Vec<Model>, Error> {
        let list: ModelList = decode::from_slice(body, policy, "models")?;
        Ok(list.into_models())
    }
}

#[cfg(test)]
mod tests {
    use genai_relay_model::{
        ChatOptions, Content, Delta, Document, DocumentSource, ErrorKind,
        FinishReason, Message, Role, ToolChoice, ToolDef, Usage,
    };
    use serde_json::json;

    use super::*;

    #[test]
    fn test_build_request() {
        let req = ChatRequest::new([Message {
            role: Role::User,
            contents: vec![
                Content::Text("What is in these files?".to_owned()),
                Content::Document(Document {
                    filename: Some("dot.png".to_owned()),
                    source: DocumentSource::Bytes(vec![0x89, 0x50, 0x4e]),
                }),
                Content::Document(Document {
                    filename: None,
                    source: DocumentSource::Url(
                        "https://example.com/report.pdf".to_owned(),
                    ),
                }),
            ],
        }])
        .with_options(ChatOptions {
            seed: Some(42),
            top_k: Some(5),
            max_tokens: Some(256),
            stop: vec!["\n\n".to_owned()],
            tools: vec![ToolDef {
                name: "search".to_owned(),
                description: "Searches the web.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
            tool_choice: ToolChoice::Required,
            ..Default::default()
        });

        let body = Mistral.build_request(&req, "mistral-small", true).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "mistral-small",
                "stream": true,
                "max_tokens": 256,
                "random_seed": 42,
                "stop": ["\n\n"],
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "What is in these files?" },
                        { "type": "image_url", "image_url": "data:image/png;base64,iVBO" },
                        { "type": "document_url", "document_url": "https://example.com/report.pdf" }
                    ]
                }],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "search",
                        "description": "Searches the web.",
                        "parameters": { "type": "object" }
                    }
                }],
                "tool_choice": "any"
            })
        );
    }

    #[test]
    fn test_inline_documents_must_be_images() {
        let req = ChatRequest::new([Message {
            role: Role::User,
            contents: vec![Content::Document(Document {
                filename: Some("notes.txt".to_owned()),
                source: DocumentSource::Bytes(b"hello".to_vec()),
            })],
        }]);
        let err = Mistral.build_request(&req, "mistral-small", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_decode_chunk_parts() {
        let payload = json!({
            "id": "cmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "magistral-small",
            "choices": [{
                "index": 0,
                "delta": {
                    "role": "assistant",
                    "content": [
                        { "type": "thinking", "thinking": [{ "type": "text", "text": "hmm" }] },
                        { "type": "text", "text": "Bonjour" }
                    ]
                },
                "finish_reason": null
            }]
        })
        .to_string();
        let chunk = Mistral.decode_chunk(&payload, DecodePolicy::Strict).unwrap();
        assert_eq!(
            chunk,
            Chunk::single(Delta::with_role("assistant").text("Bonjour"))
        );
    }

    #[test]
    fn test_decode_response() {
        let body = json!({
            "id": "cmpl-2",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "mistral-small",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello!",
                    "tool_calls": null,
                    "prefix": false
                },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7 }
        })
        .to_string();
        let chunk = Mistral
            .decode_response(body.as_bytes(), DecodePolicy::Strict)
            .unwrap();
        assert_eq!(
            chunk,
            Chunk::single(
                Delta::with_role("assistant")
                    .text("Hello!")
                    .finish(FinishReason::Stop)
            )
            .with_usage(Usage::tokens(5, 2))
        );
    }

    #[test]
    fn test_error_object() {
        let payload = json!({
            "object": "error",
            "message": "Service tier capacity exceeded for this model.",
            "type": "service_tier_capacity_exceeded",
            "param": null,
            "code": "3505"
        })
        .to_string();
        let err = Mistral
            .decode_chunk(&payload, DecodePolicy::Lenient)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            err.message(),
            "mistral: Service tier capacity exceeded for this model."
        );
    }

    #[test]
    fn test_decode_models() {
        let body = json!({
            "object": "list",
            "data": [{
                "id": "mistral-small-latest",
                "object": "model",
                "created": 1_700_000_000,
                "owned_by": "mistralai",
                "capabilities": { "completion_chat": true },
                "name": "mistral-small-2506",
                "description": "Our small model.",
                "max_context_length": 131_072,
                "aliases": [],
                "deprecation": null,
                "default_model_temperature": 0.3,
                "type": "base"
            }]
        })
        .to_string();
        let models = Mistral
            .decode_models(body.as_bytes(), DecodePolicy::Strict)
            .unwrap();
        assert_eq!(
            models,
            [Model {
                id: "mistral-small-latest".to_owned(),
                description: Some("Our small model.".to_owned()),
                context_length: Some(131_072),
            }]
        );
    }
}
