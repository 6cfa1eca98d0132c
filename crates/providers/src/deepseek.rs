//! DeepSeek chat completions.

use genai_relay_model::{
    Adapter, ChatRequest, Chunk, DecodePolicy, Error, Model,
};
use serde_json::Value;

use crate::decode;
use crate::openai_compat::{
    ChatChunk, ChatRequestBody, ChatResponse, Documents, ModelList,
    RequestTool, StreamOptions, build_messages, tool_choice,
};

/// The DeepSeek API.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeepSeek;

impl Adapter for DeepSeek {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.deepseek.com"
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
        if options.seed.is_some() {
            warn!("deepseek doesn't support seed, ignoring");
        }
        if options.top_k.is_some() {
            warn!("deepseek doesn't support top_k, ignoring");
        }
        let body = ChatRequestBody {
            model,
            messages: build_messages(self.name(), req, Documents::Unsupported)?,
            stream,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            random_seed: None,
            stop: options.stop.clone(),
            tools: options.tools.iter().map(RequestTool::from).collect(),
            tool_choice: tool_choice(req, "required"),
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
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
