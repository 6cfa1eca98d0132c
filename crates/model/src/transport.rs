use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, future, stream};
use serde_json::Value;

use crate::Error;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// A streamable response body.
pub struct Body {
    inner: ByteStream,
}

impl Body {
    /// Creates a body from a stream of byte chunks.
    #[inline]
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Creates a body holding a single chunk.
    #[inline]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_stream(stream::once(future::ready(Ok(bytes.into()))))
    }

    /// Creates a body without data.
    #[inline]
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Reads the next chunk. Returns `None` at the end of the body.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        self.inner.next().await.transpose()
    }

    /// Reads the whole body into memory.
    pub async fn collect(mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

/// An HTTP request prepared by the client.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// The full URL.
    pub url: String,
    /// Extra headers, e.g. authentication.
    pub headers: Vec<(String, String)>,
    /// The JSON body, for `POST` requests.
    pub json: Option<Value>,
}

impl HttpRequest {
    /// Returns the value of the first header with the given name, compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response whose body has not been read yet.
#[derive(Debug)]
pub struct HttpResponse {
    /// The status code.
    pub status: u16,
    /// The `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// The body.
    pub body: Body,
}

/// The HTTP capability used by the client.
///
/// Implementations are responsible for connection pooling, TLS, retries
/// and the like. They must not interpret the status code: a non-success
/// response is returned as is, so that the vendor error can be decoded.
/// Connection failures are [`ErrorKind::Transport`](crate::ErrorKind)
/// errors.
pub trait Transport: Send + Sync + 'static {
    /// Sends a `POST` request with a JSON body.
    fn post(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static;

    /// Sends a `GET` request.
    fn get(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect() {
        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]));
        assert_eq!(body.collect().await.unwrap(), b"hello world");

        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Err(Error::transport("reset")),
        ]));
        assert_eq!(body.collect().await.unwrap_err().message(), "reset");
    }

    #[tokio::test]
    async fn test_next_chunk() {
        let mut body = Body::from_bytes("data");
        assert_eq!(body.next_chunk().await.unwrap().unwrap(), "data");
        assert_eq!(body.next_chunk().await.unwrap(), None);

        let mut body = Body::empty();
        assert_eq!(body.next_chunk().await.unwrap(), None);
    }

    #[test]
    fn test_header() {
        let req = HttpRequest {
            url: "https://example.com".to_owned(),
            headers: vec![("Authorization".to_owned(), "Bearer x".to_owned())],
            json: None,
        };
        assert_eq!(req.header("authorization"), Some("Bearer x"));
        assert_eq!(req.header("x-api-key"), None);
    }
}
