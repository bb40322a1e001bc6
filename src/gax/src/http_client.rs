// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A `reqwest`-based transport for the retry and wait loops.
//!
//! Resource-specific clients use [HttpClient] to send JSON requests. Each
//! request runs through the [retry executor][crate::retry_loop], and every
//! failure is converted to an [Error] exactly once, where it first appears.

use crate::Result;
use crate::context::Context;
use crate::error::Error;
use crate::options::{ClientConfig, RequestOptions};
use crate::retry_loop::retry_execute;
use crate::waiter::wait;
use bytes::Bytes;
use http::Method;
use std::time::Duration;

/// Sends requests to the infrastructure API.
///
/// Clients are cheap to clone, clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    endpoint: String,
    config: ClientConfig,
}

impl HttpClient {
    /// Creates a client.
    ///
    /// Uses the endpoint in `config` if set, otherwise `default_endpoint`.
    pub fn new(config: ClientConfig, default_endpoint: &str) -> Self {
        let endpoint = config
            .endpoint()
            .unwrap_or(default_endpoint)
            .trim_end_matches('/')
            .to_string();
        Self {
            inner: reqwest::Client::new(),
            endpoint,
            config,
        }
    }

    /// The configuration used by this client.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates a request builder for `path`, relative to the endpoint.
    pub fn builder(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .request(method, format!("{}{path}", &self.endpoint))
    }

    /// Sends a request, retrying transient failures.
    ///
    /// The request body, if any, is serialized as JSON. The response body is
    /// parsed as JSON, an empty `204 No Content` response produces
    /// `O::default()`.
    pub async fn execute<I, O>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        body: Option<&I>,
        options: &RequestOptions,
    ) -> Result<O>
    where
        I: serde::ser::Serialize + ?Sized,
        O: serde::de::DeserializeOwned + Default,
    {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(Error::deser)?
            .map(Bytes::from);
        let policy = options.resolve_retry_policy(&self.config);
        let inner = async |remaining| {
            self.request_attempt::<O>(&method, path, payload.clone(), options, remaining)
                .await
        };
        retry_execute(ctx, &method, &policy, inner).await
    }

    /// Polls `predicate` using the wait policy for this request.
    ///
    /// See [wait] for details.
    pub async fn wait_until<P, E>(
        &self,
        ctx: &Context,
        options: &RequestOptions,
        predicate: P,
    ) -> std::result::Result<(), E>
    where
        P: AsyncFnMut(&Context) -> std::result::Result<bool, E> + Send,
        E: From<Error>,
    {
        let policy = options.resolve_wait_policy(&self.config);
        wait(ctx, &policy, predicate).await
    }

    async fn request_attempt<O: serde::de::DeserializeOwned + Default>(
        &self,
        method: &Method,
        path: &str,
        payload: Option<Bytes>,
        options: &RequestOptions,
        remaining_time: Option<Duration>,
    ) -> Result<O> {
        let mut builder = self.builder(method.clone(), path);
        if let Some(payload) = payload {
            builder = builder
                .header(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                )
                .body(payload);
        }
        builder = options
            .effective_timeout(remaining_time)
            .into_iter()
            .fold(builder, |b, t| b.timeout(t));
        tracing::trace!(%method, path, "sending request");
        let response = builder.send().await.map_err(Error::classify)?;
        if !response.status().is_success() {
            return to_http_error(response).await;
        }
        to_http_response(response).await
    }
}

async fn to_http_error<O>(response: reqwest::Response) -> Result<O> {
    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(Error::classify)?;
    Err(Error::from_http_response(status_code, headers, body))
}

async fn to_http_response<O: serde::de::DeserializeOwned + Default>(
    response: reqwest::Response,
) -> Result<O> {
    // 204 No Content has no body and fails with an EOF error if we try to
    // parse it.
    let no_content_status = response.status() == reqwest::StatusCode::NO_CONTENT;
    let body = response.bytes().await.map_err(Error::classify)?;
    match body {
        content if content.is_empty() && no_content_status => Ok(O::default()),
        content => serde_json::from_slice::<O>(&content).map_err(Error::deser),
    }
}
