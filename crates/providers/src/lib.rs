//! Vendor adapters for the relay client.
//!
//! Each adapter maps the generic request to the vendor's REST shape and
//! decodes the vendor's packets into normalized [`Chunk`]s. Adapters are
//! stateless and never perform I/O. [`Provider`] selects one of them at
//! runtime.

#[macro_use]
extern crate tracing;

#[macro_use]
mod decode;
mod cohere;
mod deepseek;
mod gemini;
mod mistral;
mod openai_compat;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use genai_relay_model::{
    Adapter, ChatRequest, Chunk, DecodePolicy, Error, Framing, Model,
};
use serde_json::Value;

pub use cohere::Cohere;
pub use deepseek::DeepSeek;
pub use gemini::Gemini;
pub use mistral::Mistral;

/// The supported providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    DeepSeek,
    Mistral,
    Cohere,
    Gemini,
}

impl Provider {
    /// All providers, in a stable order.
    pub const ALL: [Provider; 4] = [
        Provider::DeepSeek,
        Provider::Mistral,
        Provider::Cohere,
        Provider::Gemini,
    ];

    /// Looks up a provider by its name, as returned by [`Adapter::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.adapter().name() == name)
    }

    /// The environment variable conventionally holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
            Provider::Mistral => "MISTRAL_API_KEY",
            Provider::Cohere => "COHERE_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    fn adapter(&self) -> &'static dyn Adapter {
        match self {
            Provider::DeepSeek => &DeepSeek,
            Provider::Mistral => &Mistral,
            Provider::Cohere => &Cohere,
            Provider::Gemini => &Gemini,
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.adapter().name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            Error::invalid_request(format!("unknown provider {s:?}"))
        })
    }
}

impl Adapter for Provider {
    #[inline]
    fn name(&self) -> &'static str {
        self.adapter().name()
    }

    #[inline]
    fn default_base_url(&self) -> &'static str {
        self.adapter().default_base_url()
    }

    #[inline]
    fn chat_url(&self, base_url: &str, model: &str, stream: bool) -> String {
        self.adapter().chat_url(base_url, model, stream)
    }

    #[inline]
    fn models_url(&self, base_url: &str) -> Option<String> {
        self.adapter().models_url(base_url)
    }

    #[inline]
    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)> {
        self.adapter().auth_headers(api_key)
    }

    #[inline]
    fn build_request(
        &self,
        req: &ChatRequest,
        model: &str,
        stream: bool,
    ) -> Result<Value, Error> {
        self.adapter().build_request(req, model, stream)
    }

    #[inline]
    fn framing(&self) -> Framing {
        self.adapter().framing()
    }

    #[inline]
    fn decode_chunk(
        &self,
        payload: &str,
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        self.adapter().decode_chunk(payload, policy)
    }

    #[inline]
    fn decode_response(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Chunk, Error> {
        self.adapter().decode_response(body, policy)
    }

    #[inline]
    fn decode_error(&self, status: u16, body: &[u8]) -> Error {
        self.adapter().decode_error(status, body)
    }

    #[inline]
    fn decode_models(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Vec<Model>, Error> {
        self.adapter().decode_models(body, policy)
    }
}

#[cfg(test)]
mod tests {
    use genai_relay_model::ErrorKind;

    use super::*;

    #[test]
    fn test_names() {
        for provider in Provider::ALL {
            let name = provider.to_string();
            assert_eq!(name.parse::<Provider>().unwrap(), provider);
        }
        assert_eq!(Provider::from_name("gemini"), Some(Provider::Gemini));
        let err = "openai".parse::<Provider>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(Provider::Cohere.api_key_env(), "COHERE_API_KEY");
    }

    #[test]
    fn test_delegation() {
        assert!(Provider::Cohere.framing().ignore_event_lines);
        assert!(!Provider::DeepSeek.framing().ignore_event_lines);
        assert_eq!(
            Provider::Mistral.chat_url("https://api.mistral.ai/v1", "m", true),
            "https://api.mistral.ai/v1/chat/completions"
        );
        let err = Provider::Gemini
            .decode_error(400, br#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT"}}"#);
        assert_eq!(err.message(), "gemini: bad");
        assert_eq!(err.status(), Some(400));
    }
}
