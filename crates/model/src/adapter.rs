use serde_json::Value;

use crate::{ChatRequest, Chunk, DecodePolicy, Error, Model};

/// Framing options of a vendor's server-sent events stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Framing {
    /// Skip `event:` header lines instead of rejecting them. Only vendors
    /// that type their events this way should enable it.
    pub ignore_event_lines: bool,
}

/// Translates between the generic types and one vendor's REST API.
///
/// Implementations are pure mappings: they never perform I/O and never
/// keep per-call state. Everything that must behave the same across
/// vendors (framing, candidate counts, role validation, accumulation)
/// happens in the client.
pub trait Adapter: Send + Sync + 'static {
    /// A short name of the provider, used in logs.
    fn name(&self) -> &'static str;

    /// The base URL used when the configuration doesn't override it.
    fn default_base_url(&self) -> &'static str;

    /// Returns the URL of the chat endpoint.
    fn chat_url(&self, base_url: &str, model: &str, stream: bool) -> String;

    /// Returns the URL listing the models, if the vendor has one.
    fn models_url(&self, base_url: &str) -> Option<String> {
        let _ = base_url;
        None
    }

    /// Returns the authentication headers for the API key.
    fn auth_headers(&self, api_key: &str) -> Vec<(String, String)> {
        vec![("Authorization".to_owned(), format!("Bearer {api_key}"))]
    }

    /// Builds the vendor request body.
    fn build_request(
        &self,
        req: &ChatRequest,
        model: &str,
        stream: bool,
    ) -> Result<Value, Error>;

    /// Returns the framing options of the stream.
    #[inline]
    fn framing(&self) -> Framing {
        Framing::default()
    }

    /// Decodes one stream payload, i.e. the suffix of a `data: ` line.
    fn decode_chunk(
        &self,
        payload: &str,
        policy: DecodePolicy,
    ) -> Result<Chunk, Error>;

    /// Decodes a complete, non-streamed response into a single chunk
    /// holding the whole reply.
    fn decode_response(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Chunk, Error>;

    /// Converts a non-success response into an error.
    ///
    /// The default implementation understands the common
    /// `{"error": {"message": ...}}` and `{"message": ...}` shapes, and
    /// falls back to the raw body.
    fn decode_error(&self, status: u16, body: &[u8]) -> Error {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| {
                let message = v
                    .pointer("/error/message")
                    .or_else(|| v.get("message"))
                    .or_else(|| v.get("error"))?;
                message.as_str().map(ToOwned::to_owned)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        Error::transport(format!("{}: {message}", self.name()))
            .with_status(status)
    }

    /// Decodes the response of the models endpoint.
    fn decode_models(
        &self,
        body: &[u8],
        policy: DecodePolicy,
    ) -> Result<Vec<Model>, Error> {
        let _ = (body, policy);
        Err(Error::unsupported(format!(
            "{} doesn't list models",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    struct EchoAdapter;

    impl Adapter for EchoAdapter {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn default_base_url(&self) -> &'static str {
            "http://localhost"
        }

        fn chat_url(&self, base_url: &str, _: &str, _: bool) -> String {
            format!("{base_url}/chat")
        }

        fn build_request(
            &self,
            req: &ChatRequest,
            _: &str,
            _: bool,
        ) -> Result<Value, Error> {
            serde_json::to_value(req).map_err(|e| Error::decode(e.to_string()))
        }

        fn decode_chunk(
            &self,
            payload: &str,
            _: DecodePolicy,
        ) -> Result<Chunk, Error> {
            serde_json::from_str(payload)
                .map_err(|e| Error::decode(e.to_string()))
        }

        fn decode_response(
            &self,
            body: &[u8],
            _: DecodePolicy,
        ) -> Result<Chunk, Error> {
            serde_json::from_slice(body)
                .map_err(|e| Error::decode(e.to_string()))
        }
    }

    #[test]
    fn test_default_decode_error() {
        let err = EchoAdapter
            .decode_error(401, br#"{"error":{"message":"invalid key"}}"#);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "echo: invalid key");

        let err = EchoAdapter.decode_error(429, br#"{"message":"slow down"}"#);
        assert_eq!(err.message(), "echo: slow down");

        let err = EchoAdapter.decode_error(502, b"Bad Gateway");
        assert_eq!(err.message(), "echo: Bad Gateway");
    }

    #[test]
    fn test_default_models() {
        let err = EchoAdapter
            .decode_models(b"{}", DecodePolicy::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(EchoAdapter.models_url("http://localhost"), None);
        assert_eq!(
            EchoAdapter.auth_headers("k"),
            vec![("Authorization".to_owned(), "Bearer k".to_owned())]
        );
    }
}
