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

//! Defines the retry policy used by the retry executor.
//!
//! The client libraries automatically retry requests when they fail due to
//! transient errors **and** the HTTP method is idempotent, that is, it is
//! safe to perform the request more than once. By default only `GET` and
//! `HEAD` requests are retried, and only when the service responds with
//! `429`, `502`, `503`, or `504`.
//!
//! Applications may override the default behavior and retry requests that,
//! while not safe in general, may be safe given how the application manages
//! resources.
//!
//! # Example
//! ```
//! # use infra_gax::retry_policy::{Error, RetryPolicyBuilder};
//! use http::Method;
//! use std::time::Duration;
//! let policy = RetryPolicyBuilder::new()
//!     .with_maximum_attempts(5)
//!     .with_initial_delay(Duration::from_millis(250))
//!     .with_retryable_methods([Method::GET, Method::HEAD, Method::PUT])
//!     .build()?;
//! assert_eq!(policy.maximum_attempts(), 5);
//! # Ok::<(), Error>(())
//! ```

use crate::backoff_policy::BackoffPolicyArg;
use crate::error::Error as RequestError;
use crate::exponential_backoff::ExponentialBackoffBuilder;
use crate::retry_result::RetryResult;
use crate::retry_state::RetryState;
use http::Method;
use std::time::Duration;

/// The error type for retry policy creation.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("the maximum number of attempts ({0}) should be at least 1")]
    InvalidMaximumAttempts(u32),
    #[error(transparent)]
    Backoff(#[from] crate::exponential_backoff::Error),
}

/// The status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 4] = [429, 502, 503, 504];

/// Controls when, and how often, the retry executor repeats a request.
///
/// Policies are immutable. Create them with [RetryPolicyBuilder], or use the
/// [default][RetryPolicy::default]: three attempts, 100ms initial delay
/// doubling up to 5 seconds, and up to 100ms of jitter.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    maximum_attempts: u32,
    methods: Vec<Method>,
    status_codes: Vec<u16>,
    backoff: BackoffPolicyArg,
}

impl RetryPolicy {
    /// Query the retry policy after an error.
    ///
    /// # Parameters
    /// * `state` - the method, and the number of attempts so far, including
    ///   the one that just failed.
    /// * `error` - the last error received from a request.
    pub fn on_error(&self, state: &RetryState, error: RequestError) -> RetryResult {
        if !self.is_retryable_method(&state.method)
            || !self.is_retryable_status(error.status_code())
        {
            return RetryResult::Permanent(error);
        }
        if state.attempt_count >= self.maximum_attempts {
            return RetryResult::Exhausted(error);
        }
        RetryResult::Continue(error)
    }

    /// The delay before the next attempt.
    pub fn on_failure(&self, state: &RetryState) -> Duration {
        self.backoff.0.on_failure(state.start, state.attempt_count)
    }

    /// Replaces the backoff policy.
    ///
    /// The default is an [ExponentialBackoff] configured from the builder.
    ///
    /// [ExponentialBackoff]: crate::exponential_backoff::ExponentialBackoff
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff = v.into();
        self
    }

    /// Returns true if requests with this method may be repeated.
    pub fn is_retryable_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Returns true if errors with this status code may be retried.
    pub fn is_retryable_status(&self, status_code: u16) -> bool {
        self.status_codes.contains(&status_code)
    }

    /// The maximum number of attempts, including the initial one.
    pub fn maximum_attempts(&self) -> u32 {
        self.maximum_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::new().clamp()
    }
}

/// Builds [RetryPolicy] instances.
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    maximum_attempts: u32,
    methods: Vec<Method>,
    status_codes: Vec<u16>,
    backoff: ExponentialBackoffBuilder,
}

impl RetryPolicyBuilder {
    /// Creates a builder with the default parameters.
    pub fn new() -> Self {
        Self {
            maximum_attempts: 3,
            methods: vec![Method::GET, Method::HEAD],
            status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            backoff: ExponentialBackoffBuilder::new(),
        }
    }

    /// Change the maximum number of attempts, including the initial one.
    pub fn with_maximum_attempts(mut self, v: u32) -> Self {
        self.maximum_attempts = v;
        self
    }

    /// Change the delay after the first failure.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.backoff = self.backoff.with_initial_delay(v);
        self
    }

    /// Change the upper bound for the delay, before jitter.
    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.backoff = self.backoff.with_maximum_delay(v);
        self
    }

    /// Change the upper bound for the random jitter added to each delay.
    pub fn with_jitter<V: Into<Duration>>(mut self, v: V) -> Self {
        self.backoff = self.backoff.with_jitter(v);
        self
    }

    /// Replace the set of methods that are safe to retry.
    pub fn with_retryable_methods<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.methods = v.into_iter().collect();
        self
    }

    /// Replace the set of retryable HTTP status codes.
    pub fn with_retryable_status_codes<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.status_codes = v.into_iter().collect();
        self
    }

    /// Creates the policy, validating the parameters.
    pub fn build(self) -> Result<RetryPolicy, Error> {
        if self.maximum_attempts == 0 {
            return Err(Error::InvalidMaximumAttempts(self.maximum_attempts));
        }
        let backoff = self.backoff.build()?;
        Ok(RetryPolicy {
            maximum_attempts: self.maximum_attempts,
            methods: self.methods,
            status_codes: self.status_codes,
            backoff: backoff.into(),
        })
    }

    /// Creates the policy, clamping the parameters to valid ranges.
    pub fn clamp(self) -> RetryPolicy {
        RetryPolicy {
            maximum_attempts: self.maximum_attempts.max(1),
            methods: self.methods,
            status_codes: self.status_codes,
            backoff: self.backoff.clamp().into(),
        }
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff_policy::BackoffPolicy;
    use test_case::test_case;

    mockall::mock! {
        #[derive(Debug)]
        Backoff {}
        impl BackoffPolicy for Backoff {
            fn on_failure(&self, loop_start: std::time::Instant, attempt_count: u32) -> Duration;
        }
    }

    fn state(method: Method, attempt_count: u32) -> RetryState {
        RetryState::new(method).set_attempt_count(attempt_count)
    }

    #[test_case(Method::GET, 429)]
    #[test_case(Method::GET, 502)]
    #[test_case(Method::GET, 503)]
    #[test_case(Method::GET, 504)]
    #[test_case(Method::HEAD, 503)]
    fn retryable(method: Method, code: u16) {
        let policy = RetryPolicy::default();
        let flow = policy.on_error(&state(method, 1), RequestError::http_status(code, "err"));
        assert!(flow.is_continue(), "{flow:?}");
    }

    #[test_case(Method::GET, 400)]
    #[test_case(Method::GET, 404)]
    #[test_case(Method::GET, 500)]
    #[test_case(Method::POST, 503)]
    #[test_case(Method::PUT, 429)]
    #[test_case(Method::PATCH, 502)]
    #[test_case(Method::DELETE, 504)]
    fn permanent(method: Method, code: u16) {
        let policy = RetryPolicy::default();
        let flow = policy.on_error(&state(method, 1), RequestError::http_status(code, "err"));
        assert!(flow.is_permanent(), "{flow:?}");
    }

    #[test]
    fn client_side_errors_are_permanent() {
        let policy = RetryPolicy::default();
        let flow = policy.on_error(&state(Method::GET, 1), RequestError::network("refused"));
        assert!(flow.is_permanent(), "{flow:?}");
        let flow = policy.on_error(&state(Method::GET, 1), RequestError::timeout("slow"));
        assert!(flow.is_permanent(), "{flow:?}");
    }

    #[test]
    fn exhausted() {
        let policy = RetryPolicy::default();
        let flow = policy.on_error(
            &state(Method::GET, 2),
            RequestError::http_status(503, "err"),
        );
        assert!(flow.is_continue(), "{flow:?}");
        let flow = policy.on_error(
            &state(Method::GET, 3),
            RequestError::http_status(503, "err"),
        );
        assert!(flow.is_exhausted(), "{flow:?}");
        assert_eq!(flow.into_error().status_code(), 503);
    }

    #[test]
    fn custom_sets() {
        let policy = RetryPolicyBuilder::new()
            .with_retryable_methods([Method::POST])
            .with_retryable_status_codes([500])
            .build()
            .expect("hard-coded values are valid");
        assert!(policy.is_retryable_method(&Method::POST));
        assert!(!policy.is_retryable_method(&Method::GET));
        assert!(policy.is_retryable_status(500));
        assert!(!policy.is_retryable_status(503));
        let flow = policy.on_error(
            &state(Method::POST, 1),
            RequestError::http_status(500, "err"),
        );
        assert!(flow.is_continue(), "{flow:?}");
    }

    #[test]
    fn single_attempt() {
        let policy = RetryPolicyBuilder::new()
            .with_maximum_attempts(1)
            .build()
            .expect("hard-coded values are valid");
        let flow = policy.on_error(
            &state(Method::GET, 1),
            RequestError::http_status(503, "err"),
        );
        assert!(flow.is_exhausted(), "{flow:?}");
    }

    #[test]
    fn build_errors() {
        let r = RetryPolicyBuilder::new().with_maximum_attempts(0).build();
        assert!(matches!(r, Err(Error::InvalidMaximumAttempts(0))), "{r:?}");

        let r = RetryPolicyBuilder::new()
            .with_initial_delay(Duration::ZERO)
            .build();
        assert!(matches!(r, Err(Error::Backoff(_))), "{r:?}");

        let r = RetryPolicyBuilder::new()
            .with_initial_delay(Duration::from_secs(10))
            .with_maximum_delay(Duration::from_secs(1))
            .build();
        assert!(matches!(r, Err(Error::Backoff(_))), "{r:?}");
    }

    #[test]
    fn clamp() {
        let policy = RetryPolicyBuilder::new()
            .with_maximum_attempts(0)
            .with_initial_delay(Duration::ZERO)
            .clamp();
        assert_eq!(policy.maximum_attempts(), 1);
        let delay = policy.on_failure(&state(Method::GET, 1));
        assert!(delay > Duration::ZERO, "{delay:?}");
    }

    #[test]
    fn default_delays() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let d = policy.on_failure(&state(Method::GET, 1));
            assert!(
                Duration::from_millis(100) <= d && d <= Duration::from_millis(200),
                "{d:?}"
            );
            let d = policy.on_failure(&state(Method::GET, 2));
            assert!(
                Duration::from_millis(200) <= d && d <= Duration::from_millis(300),
                "{d:?}"
            );
        }
    }

    #[test]
    fn custom_backoff() {
        let mut backoff = MockBackoff::new();
        backoff
            .expect_on_failure()
            .withf(|_, count| *count == 2)
            .times(1)
            .return_const(Duration::from_secs(7));
        let policy = RetryPolicy::default().with_backoff_policy(backoff);
        assert_eq!(
            policy.on_failure(&state(Method::GET, 2)),
            Duration::from_secs(7)
        );
    }
}
