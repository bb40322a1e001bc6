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

//! Retry loop control types.

use crate::error::Error;

/// The result of a retry decision.
///
/// # Example
///
/// ```
/// # use infra_gax::error::Error;
/// # use infra_gax::retry_policy::RetryPolicy;
/// # use infra_gax::retry_result::RetryResult;
/// # use infra_gax::retry_state::RetryState;
/// let policy = RetryPolicy::default();
/// let state = RetryState::new(http::Method::GET).set_attempt_count(1_u32);
/// let flow = policy.on_error(&state, Error::http_status(503, "try again"));
/// assert!(flow.is_continue(), "{flow:?}");
/// let flow = policy.on_error(&state, Error::http_status(404, "not found"));
/// assert!(flow.is_permanent(), "{flow:?}");
/// ```
#[derive(Debug)]
pub enum RetryResult {
    /// The error is non-retryable, stop the loop.
    Permanent(Error),

    /// The error is retryable, but the policy is stopping the loop.
    ///
    /// The policy only allows a limited number of attempts.
    Exhausted(Error),

    /// The error was retryable, continue the loop.
    Continue(Error),
}

impl RetryResult {
    pub fn is_permanent(&self) -> bool {
        match &self {
            Self::Permanent(_) => true,
            Self::Exhausted(_) | Self::Continue(_) => false,
        }
    }
    pub fn is_exhausted(&self) -> bool {
        match &self {
            Self::Exhausted(_) => true,
            Self::Permanent(_) | Self::Continue(_) => false,
        }
    }
    pub fn is_continue(&self) -> bool {
        match &self {
            Self::Continue(_) => true,
            Self::Permanent(_) | Self::Exhausted(_) => false,
        }
    }

    /// The error that triggered the decision.
    pub fn into_error(self) -> Error {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::Continue(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_state() {
        let flow = RetryResult::Permanent(permanent_error());
        assert!(flow.is_permanent(), "{flow:?}");
        assert!(!flow.is_exhausted(), "{flow:?}");
        assert!(!flow.is_continue(), "{flow:?}");

        let flow = RetryResult::Exhausted(transient_error());
        assert!(!flow.is_permanent(), "{flow:?}");
        assert!(flow.is_exhausted(), "{flow:?}");
        assert!(!flow.is_continue(), "{flow:?}");

        let flow = RetryResult::Continue(transient_error());
        assert!(!flow.is_permanent(), "{flow:?}");
        assert!(!flow.is_exhausted(), "{flow:?}");
        assert!(flow.is_continue(), "{flow:?}");
    }

    #[test]
    fn into_error() {
        let got = RetryResult::Exhausted(transient_error()).into_error();
        assert_eq!(got.status_code(), 503);
        let got = RetryResult::Permanent(permanent_error()).into_error();
        assert_eq!(got.status_code(), 403);
    }

    fn permanent_error() -> Error {
        Error::http_status(403, "permission denied")
    }

    fn transient_error() -> Error {
        Error::http_status(503, "unavailable")
    }
}
