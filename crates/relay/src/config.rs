use std::env;
use std::fmt::Debug;

use genai_relay_model::{DecodePolicy, Error};

/// The default capacity of the fragment channel of a streaming call.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Builder for [`ClientConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    decode_policy: DecodePolicy,
    channel_capacity: usize,
}

impl ClientConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            decode_policy: DecodePolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Creates a builder with the API key read from the environment
    /// variable `var`, which must be set and non-empty.
    pub fn from_env(var: &str) -> Result<Self, Error> {
        match env::var(var) {
            Ok(api_key) if !api_key.is_empty() => {
                Ok(Self::with_api_key(api_key))
            }
            _ => Err(Error::invalid_request(format!(
                "api key is required, set the {var} environment variable"
            ))),
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how strictly vendor payloads are decoded.
    #[inline]
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Sets the capacity of the fragment channel used by
    /// [`Client::stream`](crate::Client::stream). Clamped to at least 1.
    #[inline]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            api_key: self.api_key,
            model: self.model,
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_owned()),
            decode_policy: self.decode_policy,
            channel_capacity: self.channel_capacity,
        }
    }
}

impl Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("decode_policy", &self.decode_policy)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

/// Configuration of a [`Client`](crate::Client).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) model: Option<String>,
    pub(crate) base_url: Option<String>,
    pub(crate) decode_policy: DecodePolicy,
    pub(crate) channel_capacity: usize,
}

impl ClientConfig {
    /// Returns the configured model, if any.
    #[inline]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns the decode policy.
    #[inline]
    pub fn decode_policy(&self) -> DecodePolicy {
        self.decode_policy
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("decode_policy", &self.decode_policy)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use genai_relay_model::ErrorKind;

    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfigBuilder::with_api_key("sk-secret")
            .with_model("deepseek-chat")
            .with_base_url("http://localhost:8080/")
            .with_channel_capacity(0)
            .with_decode_policy(DecodePolicy::Lenient)
            .build();
        assert_eq!(config.model(), Some("deepseek-chat"));
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.decode_policy(), DecodePolicy::Lenient);

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_missing_env() {
        let err = ClientConfigBuilder::from_env("GENAI_RELAY_SURELY_UNSET_KEY")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.message().contains("GENAI_RELAY_SURELY_UNSET_KEY"));
    }
}
