//! Google Gemini, `generateContent` API v1beta.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use genai_relay_model::{
    Adapter, ChatRequest, Chunk, Content, DecodePolicy, Delta, DeltaPart,
    DocumentFragment, DocumentSource, Error, FinishReason, Model, Role,
    ToolCallDelta, ToolChoice, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::{self, ApiError, Extra, VendorError};

/// The Gemini API.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gemini;

impl Adapter for Gemini {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_base_url(&self) -> &'static str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    fn chat_url(&self, base_url: &str, model: &str, stream: bool) -> String {
        if stream {
            format!("{base_url}/models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{base_url}/models/{model}:generateContent")
        }
    }

    fn models_url(&self, base_url: &str) -> Option<String> {
        Some(format!("{base_url}/models?pageSize=1000"))
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)> {
        vec![("x-goog-api-key".to_owned(), api_key.to_owned())]
    }

    fn build_request(
        &self,
        req: &ChatRequest,
        _model: &str,
        _stream: bool,
    ) -> Result<Value, Error> {
        let body = build_request(req)?;
        serde_json::to_value(body)
            .map_err(|err| Error::invalid_request(err.to_string()))
    }

    fn decode_chunk(
        &self,
        payload: &str,
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let resp: GenerateResponse = decode::vendor_payload(
            self.name(),
            payload.as_bytes(),
            policy,
            "chunk",
        )?;
        resp.into_chunk()
    }

    fn decode_response(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        let resp: GenerateResponse =
            decode::vendor_payload(self.name(), body, policy, "response")?;
        resp.into_chunk()
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
                id: match m.name.strip_prefix("models/") {
                    Some(id) => id.to_owned(),
                    None => m.name,
                },
                description: m.description.filter(|d| !d.is_empty()),
                context_length: m.input_token_limit,
            })
            .collect())
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    #[serde(skip_serializing_if = "GenerationConfig::is_empty")]
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
}

#[derive(Debug, Default, Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    Text(String),
    InlineData(Blob),
    FileData(FileData),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionResponse {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    response: Value,
}

fn build_request(req: &ChatRequest) -> Result<GenerateRequest, Error> {
    let options = &req.options;
    let mut system = Vec::new();
    if let Some(system_prompt) = &options.system_prompt {
        system.push(RequestPart::Text(system_prompt.clone()));
    }

    let mut contents = Vec::with_capacity(req.messages.len());
    for (i, msg) in req.messages.iter().enumerate() {
        let mut parts = Vec::with_capacity(msg.contents.len());
        for content in &msg.contents {
            parts.push(request_part(content).map_err(|err| {
                Error::invalid_request(format!("message {i}: {}", err.message()))
            })?);
        }
        let role = match msg.role {
            Role::System => {
                system.extend(parts);
                continue;
            }
            Role::User | Role::Tool => "user",
            Role::Assistant => "model",
        };
        contents.push(RequestContent {
            role: Some(role),
            parts,
        });
    }

    let mut out = GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then(|| RequestContent {
            role: None,
            parts: system,
        }),
        generation_config: GenerationConfig {
            stop_sequences: options.stop.clone(),
            max_output_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            seed: options.seed,
        },
        ..Default::default()
    };
    if !options.tools.is_empty() {
        out.tools.push(RequestTools {
            function_declarations: options
                .tools
                .iter()
                .map(|tool| FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                })
                .collect(),
        });
        out.tool_config = Some(ToolConfig {
            function_calling_config: FunctionCallingConfig {
                mode: match options.tool_choice {
                    ToolChoice::Auto => "AUTO",
                    ToolChoice::Required => "ANY",
                    ToolChoice::None => "NONE",
                },
            },
        });
    }
    Ok(out)
}

fn request_part(content: &Content) -> Result<RequestPart, Error> {
    let part = match content {
        Content::Text(text) => RequestPart::Text(text.clone()),
        Content::Document(doc) => {
            let mime_type = doc.mime_type().map(|m| m.essence_str().to_owned());
            match &doc.source {
                DocumentSource::Bytes(data) => {
                    let Some(mime_type) = mime_type else {
                        return Err(Error::invalid_request(
                            "inline document needs a filename with a known \
                             extension",
                        ));
                    };
                    RequestPart::InlineData(Blob {
                        mime_type,
                        data: STANDARD.encode(data),
                        extra: Extra::new(),
                    })
                }
                DocumentSource::Url(url) => RequestPart::FileData(FileData {
                    mime_type,
                    file_uri: url.clone(),
                    extra: Extra::new(),
                }),
            }
        }
        Content::ToolCall(call) => RequestPart::FunctionCall(FunctionCall {
            id: (!call.id.is_empty()).then(|| call.id.clone()),
            name: call.name.clone(),
            args: call.arguments_value()?,
            extra: Extra::new(),
        }),
        Content::ToolCallResult(result) => {
            // The response must be an object.
            let response = match serde_json::from_str(&result.result) {
                Ok(Value::Object(object)) => Value::Object(object),
                Ok(value) => wrap_result(value),
                Err(_) => wrap_result(Value::String(result.result.clone())),
            };
            RequestPart::FunctionResponse(FunctionResponse {
                id: result.id.clone(),
                name: result.name.clone(),
                response,
            })
        }
    };
    Ok(part)
}

fn wrap_result(value: Value) -> Value {
    let mut object = Map::new();
    object.insert("result".to_owned(), value);
    Value::Object(object)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    GenerateResponse { candidates, usage_metadata },
    known = ["modelVersion", "responseId", "promptFeedback", "createTime"]
);

impl VendorError for GenerateResponse {
    fn vendor_error(&self) -> Option<String> {
        self.error.as_ref().map(ApiError::message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    Candidate { content },
    known = [
        "index",
        "safetyRatings",
        "citationMetadata",
        "tokenCount",
        "groundingMetadata",
        "groundingAttributions",
        "avgLogprobs",
        "logprobsResult",
        "urlContextMetadata",
        "finishMessage",
    ]
);

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ResponsePart>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ResponseContent { parts });

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    inline_data: Option<Blob>,
    #[serde(default)]
    file_data: Option<FileData>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    ResponsePart { inline_data, file_data, function_call },
    known = [
        "thoughtSignature",
        "executableCode",
        "codeExecutionResult",
        "videoMetadata",
    ]
);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(Blob {});

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    file_uri: String,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(FileData {});

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(FunctionCall {});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    UsageMetadata {},
    known = [
        "toolUsePromptTokenCount",
        "totalTokenCount",
        "promptTokensDetails",
        "cacheTokensDetails",
        "candidatesTokensDetails",
        "toolUsePromptTokensDetails",
        "trafficType",
    ]
);

impl UsageMetadata {
    fn to_usage(&self) -> Usage {
        Usage {
            input_tokens: self.prompt_token_count,
            input_cached_tokens: self.cached_content_token_count,
            output_tokens: self.candidates_token_count
                + self.thoughts_token_count,
            finish_reason: None,
        }
    }
}

impl GenerateResponse {
    fn into_chunk(self) -> Result<Chunk, Error> {
        let candidates = self
            .candidates
            .into_iter()
            .map(Candidate::into_delta)
            .collect::<Result<_, _>>()?;
        Ok(Chunk {
            candidates,
            usage: self.usage_metadata.as_ref().map(UsageMetadata::to_usage),
        })
    }
}

impl Candidate {
    fn into_delta(self) -> Result<Delta, Error> {
        let content = self.content.unwrap_or_default();
        let role = match content.role.as_deref() {
            Some("model") => "assistant".to_owned(),
            other => other.unwrap_or_default().to_owned(),
        };
        let mut delta = Delta::with_role(role);
        for part in content.parts {
            if part.thought {
                continue;
            }
            if let Some(text) = part.text {
                delta = delta.text(text);
            }
            if let Some(blob) = part.inline_data {
                let data = STANDARD.decode(&blob.data).map_err(|err| {
                    Error::decode(format!("invalid inline data: {err}"))
                })?;
                delta.parts.push(DeltaPart::Document(DocumentFragment {
                    filename: Some(filename_for(&blob.mime_type)),
                    url: None,
                    data,
                }));
            }
            if let Some(file) = part.file_data {
                delta.parts.push(DeltaPart::Document(DocumentFragment {
                    filename: None,
                    url: Some(file.file_uri),
                    data: Vec::new(),
                }));
            }
            if let Some(call) = part.function_call {
                delta = delta.tool_call(ToolCallDelta {
                    index: None,
                    id: call.id,
                    name: Some(call.name),
                    arguments: call.args.to_string(),
                });
            }
        }
        delta.finish_reason = self
            .finish_reason
            .as_deref()
            .and_then(FinishReason::from_vendor);
        Ok(delta)
    }
}

/// Names an inline document after its media type.
fn filename_for(mime_type: &str) -> String {
    let ext = match mime_type {
        "image/jpeg" => "jpg",
        "text/plain" => "txt",
        "audio/mpeg" => "mp3",
        "text/markdown" => "md",
        other => match other.split_once('/') {
            Some((_, subtype)) if !subtype.is_empty() => subtype,
            _ => "bin",
        },
    };
    format!("document.{ext}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ApiModel>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(ModelList { models }, known = ["nextPageToken"]);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiModel {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u64>,
    #[serde(flatten)]
    extra: Extra,
}
unknown_fields!(
    ApiModel {},
    known = [
        "baseModelId",
        "version",
        "displayName",
        "outputTokenLimit",
        "supportedGenerationMethods",
        "temperature",
        "maxTemperature",
        "topP",
        "topK",
        "thinking",
    ]
);
