//! Shared HTTP transport for backend providers.
//!
//! `HttpTransport` owns a `reqwest::Client` until `close()` drops it, maps
//! non-success statuses to [`ProviderError::Status`], and splits streaming
//! bodies into lines for both NDJSON (Ollama) and SSE (llama.cpp).

use crate::BackendConfig;
use anyhow::Result;
use async_stream::try_stream;
use fcore::ProviderError;
use futures_core::Stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::{
    Client, Response,
    header::{self, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

/// Longest error body kept in a [`ProviderError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client handle that can be released once.
pub struct HttpTransport {
    client: Mutex<Option<Client>>,
}

impl HttpTransport {
    /// Build a client with JSON headers and the configured timeouts.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: Mutex::new(Some(builder.build()?)),
        })
    }

    fn client(&self) -> Result<Client> {
        self.client
            .lock()
            .clone()
            .ok_or_else(|| ProviderError::Closed.into())
    }

    /// Send a GET request without checking the status.
    pub async fn get(&self, url: &str) -> Result<Response> {
        tracing::trace!("GET {url}");
        Ok(self.client()?.get(url).send().await?)
    }

    /// GET `url` and deserialize a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = check(self.get(url).await?).await?;
        Ok(response.json().await?)
    }

    /// POST `body` and deserialize a successful JSON body.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T> {
        let response = self.post_stream(url, body).await?;
        Ok(response.json().await?)
    }

    /// POST `body` and return the successful response unread.
    pub async fn post_stream(&self, url: &str, body: &(impl Serialize + Sync)) -> Result<Response> {
        if let Ok(body) = serde_json::to_string(body) {
            tracing::trace!("POST {url}: {body}");
        }
        let response = self.client()?.post(url).json(body).send().await?;
        check(response).await
    }

    /// Drop the client and its connection pool. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.client.lock().take().is_some() {
            tracing::debug!("http transport closed");
        }
        Ok(())
    }
}

/// Turn a non-success status into [`ProviderError::Status`].
pub async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let host = response.url().origin().ascii_serialization();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    Err(ProviderError::Status {
        host,
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Split a streaming body into trimmed, non-empty lines.
///
/// Lines may straddle network chunks; a trailing line without a newline is
/// yielded when the body ends.
pub fn lines(response: Response) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(next) = stream.next().await {
            let bytes = next?;
            buffer.extend_from_slice(&bytes);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_owned();
                if !line.is_empty() {
                    tracing::trace!("line: {line}");
                    yield line;
                }
            }
        }

        let rest = String::from_utf8_lossy(&buffer).trim().to_owned();
        if !rest.is_empty() {
            tracing::trace!("line: {rest}");
            yield rest;
        }
    }
}
