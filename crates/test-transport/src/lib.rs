//! A scripted transport for testing clients without a network.

mod body;
mod preset;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use genai_relay_model::{Body, Error, HttpRequest, HttpResponse, Transport};

pub use body::ScriptedBody;
pub use preset::*;

/// The HTTP method of a recorded request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A request received by a [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub request: HttpRequest,
}

#[derive(Debug, Default)]
struct State {
    responses: VecDeque<ScriptedResponse>,
    requests: Vec<RecordedRequest>,
}

/// A transport answering requests with scripted responses.
///
/// Responses are handed out in the order they were pushed, regardless of
/// the request. Once the script is exhausted, requests fail with a
/// transport error. Every request is recorded for later inspection.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    /// Creates a transport answering with the given responses.
    pub fn with_responses(
        responses: impl IntoIterator<Item = ScriptedResponse>,
    ) -> Self {
        let transport = Self::default();
        for resp in responses {
            transport.push_response(resp);
        }
        transport
    }

    /// Appends a response to the script.
    #[inline]
    pub fn push_response(&self, resp: ScriptedResponse) {
        self.lock().responses.push_back(resp);
    }

    /// Returns the requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(
        &self,
        method: Method,
        request: HttpRequest,
    ) -> Result<HttpResponse, Error> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest { method, request });
        let Some(resp) = state.responses.pop_front() else {
            return Err(Error::transport("connection refused: script exhausted"));
        };
        Ok(HttpResponse {
            status: resp.status,
            content_type: resp.content_type,
            body: Body::from_stream(ScriptedBody::new(resp.steps)),
        })
    }
}

impl Transport for ScriptedTransport {
    fn post(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static
    {
        std::future::ready(self.respond(Method::Post, req))
    }

    fn get(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static
    {
        std::future::ready(self.respond(Method::Get, req))
    }
}
