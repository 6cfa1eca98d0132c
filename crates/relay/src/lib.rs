//! Streaming chat completions over vendor REST APIs.
//!
//! A [`Client`] pairs a vendor [`Adapter`] with a [`Transport`]. Streaming
//! calls read the server-sent events of the response on a background task,
//! decode every payload into a normalized chunk, fold it into the reply
//! being assembled and relay the resulting [`Fragment`]s over a bounded
//! channel. The final [`Completion`] is published once the stream ended.

#[macro_use]
extern crate tracing;

mod accumulator;
mod cancel;
mod config;
mod decoder;
mod http;
mod io;
mod relay;

use std::sync::Arc;

use genai_relay_model::{
    Adapter, ChatRequest, Completion, Error, Fragment, HttpRequest,
    HttpResponse, Model, Transport,
};
use mime::Mime;
use tokio::sync::{mpsc, oneshot};

use accumulator::Accumulator;
pub use cancel::CancelHandle;
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_CHANNEL_CAPACITY};
use decoder::PacketDecoder;
pub use genai_relay_model as model;
pub use http::HttpTransport;
use io::{Chunks, Sse};
pub use relay::CompletionStream;

/// A chat client for one provider.
#[derive(Debug)]
pub struct Client<A, T = HttpTransport> {
    adapter: Arc<A>,
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

impl<A, T> Clone for Client<A, T> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: Adapter> Client<A> {
    /// Creates a client sending requests over HTTP.
    #[inline]
    pub fn new(adapter: A, config: ClientConfig) -> Self {
        Self::with_transport(adapter, HttpTransport::new(), config)
    }
}

impl<A: Adapter, T: Transport> Client<A, T> {
    /// Creates a client with a custom transport.
    #[inline]
    pub fn with_transport(adapter: A, transport: T, config: ClientConfig) -> Self {
        Self {
            adapter: Arc::new(adapter),
            transport: Arc::new(transport),
            config: Arc::new(config),
        }
    }

    /// Returns the adapter.
    #[inline]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a non-streaming request and returns the whole reply.
    pub async fn complete(&self, req: &ChatRequest) -> Result<Completion, Error> {
        let http_req = self.chat_request(req, false)?;
        debug!("sending request to {}", http_req.url);
        let resp = self.transport.post(http_req).await?;
        let body = self.read_success(resp).await?;

        let decoder = self.decoder();
        let packet = decoder.decode_response(&body)?;
        let mut acc = Accumulator::default();
        acc.fold(packet)?;
        let completion = acc.finish();
        debug!("request completed, usage: {}", completion.usage);
        Ok(completion)
    }

    /// Sends a streaming request.
    ///
    /// Returns once the provider accepted the request. Fragments are then
    /// received from the returned stream, in order.
    pub async fn stream(
        &self,
        req: &ChatRequest,
    ) -> Result<CompletionStream, Error> {
        let (handle, token) = cancel::pair();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let result = self.start_stream(req, tx, token).await?;
        Ok(CompletionStream::new(rx, result, handle))
    }

    /// Sends a streaming request, relaying the fragments to `sink`, and
    /// returns the final result.
    ///
    /// `sink` is closed before this method returns. Dropping the returned
    /// future cancels the call; so does dropping the receiver of `sink`.
    pub async fn complete_stream(
        &self,
        req: &ChatRequest,
        sink: mpsc::Sender<Fragment>,
    ) -> Result<Completion, Error> {
        let (_handle, token) = cancel::pair();
        let mut result = self.start_stream(req, sink, token).await?;
        relay::wait_result(&mut result).await
    }

    /// Lists the models available to the configured API key.
    pub async fn list_models(&self) -> Result<Vec<Model>, Error> {
        let Some(url) = self.adapter.models_url(self.base_url()) else {
            return Err(Error::unsupported(format!(
                "{} doesn't list models",
                self.adapter.name()
            )));
        };
        let http_req = HttpRequest {
            url,
            headers: self.auth_headers(),
            json: None,
        };
        debug!("listing models from {}", http_req.url);
        let resp = self.transport.get(http_req).await?;
        let body = self.read_success(resp).await?;
        self.adapter
            .decode_models(&body, self.config.decode_policy)
    }

    async fn start_stream(
        &self,
        req: &ChatRequest,
        sink: mpsc::Sender<Fragment>,
        token: cancel::CancelToken,
    ) -> Result<oneshot::Receiver<Result<Completion, Error>>, Error> {
        let http_req = self.chat_request(req, true)?;
        debug!("sending streaming request to {}", http_req.url);
        let resp = self.transport.post(http_req).await?;
        if !is_success(resp.status) {
            return Err(self.read_error(resp).await);
        }

        let content_type = resp.content_type.as_deref().unwrap_or_default();
        let is_event_stream = content_type
            .parse::<Mime>()
            .map(|m| m.essence_str() == mime::TEXT_EVENT_STREAM.essence_str())
            .unwrap_or(false);
        if !is_event_stream {
            let body = resp.body.collect().await.unwrap_or_default();
            return Err(Error::transport(format!(
                "unexpected content type {content_type:?}: {}",
                String::from_utf8_lossy(&body)
            ))
            .with_status(resp.status));
        }

        let chunks = Chunks::new(resp.body, token.clone());
        let sse = Sse::new(chunks, self.adapter.framing());
        Ok(relay::spawn(sse, self.decoder(), sink, token))
    }

    fn chat_request(
        &self,
        req: &ChatRequest,
        stream: bool,
    ) -> Result<HttpRequest, Error> {
        req.validate()?;
        let Some(model) = self.config.model.as_deref() else {
            return Err(Error::invalid_request("model is required"));
        };
        let json = self.adapter.build_request(req, model, stream)?;
        trace!("request body: {json}");
        Ok(HttpRequest {
            url: self.adapter.chat_url(self.base_url(), model, stream),
            headers: self.auth_headers(),
            json: Some(json),
        })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.adapter.default_base_url())
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        if self.config.api_key.is_empty() {
            return Vec::new();
        }
        self.adapter.auth_headers(&self.config.api_key)
    }

    fn decoder(&self) -> PacketDecoder<A> {
        PacketDecoder::new(Arc::clone(&self.adapter), self.config.decode_policy)
    }

    async fn read_success(&self, resp: HttpResponse) -> Result<Vec<u8>, Error> {
        if !is_success(resp.status) {
            return Err(self.read_error(resp).await);
        }
        resp.body.collect().await
    }

    async fn read_error(&self, resp: HttpResponse) -> Error {
        let status = resp.status;
        match resp.body.collect().await {
            Ok(body) => {
                let err = self.adapter.decode_error(status, &body);
                warn!("provider returned an error: {err}");
                err
            }
            Err(err) => err.with_status(status),
        }
    }
}

#[inline]
fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
