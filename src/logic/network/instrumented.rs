//! reqwest instrumentation
//!
//! Wraps a `reqwest::Client` so every call made through it lands in the
//! [`NetworkTrafficCollector`]. The response body is buffered so it can be
//! both recorded and handed back to the caller.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use super::collector::NetworkTrafficCollector;
use super::types::{BodyRead, Headers};

/// Buffered response returned to the caller
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl CapturedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Clone)]
pub struct InstrumentedClient {
    client: reqwest::Client,
    collector: Arc<NetworkTrafficCollector>,
}

impl InstrumentedClient {
    pub fn new(client: reqwest::Client, collector: Arc<NetworkTrafficCollector>) -> Self {
        Self { client, collector }
    }

    /// Underlying client, for building requests
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn send(&self, builder: reqwest::RequestBuilder) -> reqwest::Result<CapturedResponse> {
        let request = builder.build()?;
        self.execute(request).await
    }

    pub async fn execute(&self, request: reqwest::Request) -> reqwest::Result<CapturedResponse> {
        let method = request.method().as_str().to_string();
        let url = request.url().to_string();
        let body = match request.body() {
            None => BodyRead::Empty,
            Some(body) => match body.as_bytes() {
                Some(bytes) => BodyRead::from(Some(bytes)),
                None => BodyRead::Failed("streaming body is not buffered"),
            },
        };
        let token = self
            .collector
            .on_request_start(&method, &url, to_headers(request.headers()), body);

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.collector.on_request_failed(token, e.to_string());
                return Err(e);
            }
        };

        let status = response.status().as_u16();
        let headers = to_headers(response.headers());

        match response.bytes().await {
            Ok(bytes) => {
                self.collector
                    .on_request_complete(token, status, headers.clone(), BodyRead::from(Some(&bytes[..])));
                Ok(CapturedResponse {
                    status,
                    headers,
                    body: bytes.to_vec(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                self.collector
                    .on_request_complete(token, status, headers, BodyRead::Failed(&message));
                Err(e)
            }
        }
    }
}

fn to_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            let value = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}
