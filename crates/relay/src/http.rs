use futures_util::stream;
use genai_relay_model::{Body, Error, HttpRequest, HttpResponse, Transport};
use reqwest::{Client, RequestBuilder, Response, header};

/// A [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport using the given client, e.g. to configure
    /// proxies or timeouts.
    #[inline]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn send(
        builder: RequestBuilder,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static
    {
        let mut builder = builder.header(
            header::ACCEPT,
            "application/json, text/event-stream",
        );
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(json) = &req.json {
            builder = builder.json(json);
        }
        let resp_fut = builder.send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                Error::transport(format!("request to {} failed: {err}", req.url))
            })?;
            Ok(into_http_response(resp))
        }
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static
    {
        Self::send(self.client.post(&req.url), req)
    }

    fn get(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send + 'static
    {
        Self::send(self.client.get(&req.url), req)
    }
}

fn into_http_response(resp: Response) -> HttpResponse {
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let chunks = stream::unfold(Some(resp), |resp| async move {
        let mut resp = resp?;
        match resp.chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(resp))),
            Ok(None) => None,
            Err(err) => Some((
                Err(Error::transport(format!("failed to read body: {err}"))),
                None,
            )),
        }
    });
    HttpResponse {
        status,
        content_type,
        body: Body::from_stream(chunks),
    }
}
