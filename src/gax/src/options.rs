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

//! Client configuration and per request options.
//!
//! While the defaults are intended to work for most applications, it is
//! sometimes necessary to change the configuration. Applications may change
//! the retry or wait policies for all the requests made by a client, via
//! [ClientConfig], or for a single request, via [RequestOptions].
//!
//! Policies are resolved in order: the request options, then the client
//! configuration, and then the built-in defaults.
//!
//! # Example
//! ```
//! # use infra_gax::options::{ClientConfig, RequestOptions};
//! # use infra_gax::retry_policy::RetryPolicyBuilder;
//! let mut config = ClientConfig::default();
//! config.set_retry_policy(RetryPolicyBuilder::new().with_maximum_attempts(5).clamp());
//!
//! let mut options = RequestOptions::default();
//! options.set_attempt_timeout(std::time::Duration::from_secs(10));
//! let policy = options.resolve_retry_policy(&config);
//! assert_eq!(policy.maximum_attempts(), 5);
//! ```

use crate::retry_policy::RetryPolicy;
use crate::wait_policy::WaitPolicy;
use std::time::Duration;

/// Configure a client.
///
/// A client may be shared by many tasks, the configuration is immutable once
/// the client is created.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    endpoint: Option<String>,
    retry_policy: Option<RetryPolicy>,
    wait_policy: Option<WaitPolicy>,
}

impl ClientConfig {
    /// Gets the endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Sets an endpoint that overrides the default endpoint for a service.
    pub fn set_endpoint<T: Into<String>>(&mut self, v: T) {
        self.endpoint = Some(v.into());
    }

    /// Gets the retry policy for all requests, if any.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Sets the retry policy for all requests.
    pub fn set_retry_policy<V: Into<RetryPolicy>>(&mut self, v: V) {
        self.retry_policy = Some(v.into());
    }

    /// Gets the wait policy for all wait loops, if any.
    pub fn wait_policy(&self) -> Option<&WaitPolicy> {
        self.wait_policy.as_ref()
    }

    /// Sets the wait policy for all wait loops.
    pub fn set_wait_policy<V: Into<WaitPolicy>>(&mut self, v: V) {
        self.wait_policy = Some(v.into());
    }
}

/// A set of options configuring a single request.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    attempt_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    wait_policy: Option<WaitPolicy>,
}

impl RequestOptions {
    /// Sets the per-attempt timeout.
    ///
    /// When using a retry loop, this affects the timeout for each attempt. The
    /// overall timeout for a request is set by the [Context] deadline.
    ///
    /// [Context]: crate::context::Context
    pub fn set_attempt_timeout<T: Into<Duration>>(&mut self, v: T) {
        self.attempt_timeout = Some(v.into());
    }

    /// Gets the current per-attempt timeout.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Get the current retry policy override, if any.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Sets the retry policy configuration.
    pub fn set_retry_policy<V: Into<RetryPolicy>>(&mut self, v: V) {
        self.retry_policy = Some(v.into());
    }

    /// Get the current wait policy override, if any.
    pub fn wait_policy(&self) -> Option<&WaitPolicy> {
        self.wait_policy.as_ref()
    }

    /// Sets the wait policy configuration.
    pub fn set_wait_policy<V: Into<WaitPolicy>>(&mut self, v: V) {
        self.wait_policy = Some(v.into());
    }

    /// The retry policy for this request.
    pub fn resolve_retry_policy(&self, config: &ClientConfig) -> RetryPolicy {
        self.retry_policy
            .as_ref()
            .or(config.retry_policy.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// The wait policy for this request.
    pub fn resolve_wait_policy(&self, config: &ClientConfig) -> WaitPolicy {
        self.wait_policy
            .as_ref()
            .or(config.wait_policy.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// The timeout for the next attempt, given the time left in the
    /// request's context.
    pub fn effective_timeout(&self, remaining_time: Option<Duration>) -> Option<Duration> {
        match (self.attempt_timeout, remaining_time) {
            (None, None) => None,
            (None, Some(t)) => Some(t),
            (Some(t), None) => Some(t),
            (Some(a), Some(r)) => Some(std::cmp::min(a, r)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry_policy::RetryPolicyBuilder;
    use crate::wait_policy::WaitPolicyBuilder;
    use test_case::test_case;

    fn retry(attempts: u32) -> RetryPolicy {
        RetryPolicyBuilder::new()
            .with_maximum_attempts(attempts)
            .clamp()
    }

    fn wait(seconds: u64) -> WaitPolicy {
        WaitPolicyBuilder::new()
            .with_maximum_wait(Duration::from_secs(seconds))
            .clamp()
    }

    #[test]
    fn client_config() {
        let mut config = ClientConfig::default();
        assert!(config.endpoint().is_none());
        assert!(config.retry_policy().is_none());
        assert!(config.wait_policy().is_none());

        config.set_endpoint("http://localhost:8080");
        config.set_retry_policy(retry(7));
        config.set_wait_policy(wait(42));
        assert_eq!(config.endpoint(), Some("http://localhost:8080"));
        assert_eq!(config.retry_policy().map(|p| p.maximum_attempts()), Some(7));
        assert_eq!(
            config.wait_policy().map(|p| p.maximum_wait()),
            Some(Duration::from_secs(42))
        );
    }

    #[test]
    fn request_options() {
        let mut opts = RequestOptions::default();
        assert_eq!(opts.attempt_timeout(), None);
        assert!(opts.retry_policy().is_none());
        assert!(opts.wait_policy().is_none());

        opts.set_attempt_timeout(Duration::from_secs(3));
        opts.set_retry_policy(retry(2));
        opts.set_wait_policy(wait(10));
        assert_eq!(opts.attempt_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(opts.retry_policy().map(|p| p.maximum_attempts()), Some(2));
        assert_eq!(
            opts.wait_policy().map(|p| p.maximum_wait()),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn resolve_defaults() {
        let config = ClientConfig::default();
        let opts = RequestOptions::default();
        assert_eq!(opts.resolve_retry_policy(&config).maximum_attempts(), 3);
        assert_eq!(
            opts.resolve_wait_policy(&config).maximum_wait(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn resolve_client() {
        let mut config = ClientConfig::default();
        config.set_retry_policy(retry(5));
        config.set_wait_policy(wait(60));
        let opts = RequestOptions::default();
        assert_eq!(opts.resolve_retry_policy(&config).maximum_attempts(), 5);
        assert_eq!(
            opts.resolve_wait_policy(&config).maximum_wait(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn resolve_request() {
        let mut config = ClientConfig::default();
        config.set_retry_policy(retry(5));
        config.set_wait_policy(wait(60));
        let mut opts = RequestOptions::default();
        opts.set_retry_policy(retry(1));
        opts.set_wait_policy(wait(5));
        assert_eq!(opts.resolve_retry_policy(&config).maximum_attempts(), 1);
        assert_eq!(
            opts.resolve_wait_policy(&config).maximum_wait(),
            Duration::from_secs(5)
        );
    }

    #[test_case(None, None, None)]
    #[test_case(Some(Duration::from_secs(4)), Some(Duration::from_secs(4)), None)]
    #[test_case(Some(Duration::from_secs(4)), None, Some(Duration::from_secs(4)))]
    #[test_case(
        Some(Duration::from_secs(2)),
        Some(Duration::from_secs(2)),
        Some(Duration::from_secs(4))
    )]
    #[test_case(
        Some(Duration::from_secs(2)),
        Some(Duration::from_secs(4)),
        Some(Duration::from_secs(2))
    )]
    fn effective_timeouts(
        want: Option<Duration>,
        remaining: Option<Duration>,
        request: Option<Duration>,
    ) {
        let options = request.into_iter().fold(RequestOptions::default(), |mut o, t| {
            o.set_attempt_timeout(t);
            o
        });
        assert_eq!(options.effective_timeout(remaining), want);
    }
}
