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

//! Defines the policy controlling [wait][crate::waiter::wait] loops.
//!
//! A wait loop polls the state of a resource until some condition is met.
//! The policy sets how long to sleep between polls, and how long to wait in
//! total. By default the loop polls every 2 seconds for up to 5 minutes.
//!
//! # Example
//! ```
//! # use infra_gax::wait_policy::{Error, WaitPolicyBuilder};
//! use std::time::Duration;
//! // Poll after 1s, 2s, 4s, ... but never wait more than 20s between polls,
//! // and give up after 10 minutes.
//! let policy = WaitPolicyBuilder::new()
//!     .with_interval(Duration::from_secs(1))
//!     .with_multiplier(2.0)
//!     .with_maximum_interval(Duration::from_secs(20))
//!     .with_maximum_wait(Duration::from_secs(600))
//!     .build()?;
//! assert_eq!(policy.maximum_wait(), Duration::from_secs(600));
//! # Ok::<(), Error>(())
//! ```

use crate::exponential_backoff::ExponentialBackoffBuilder;
use crate::polling_backoff_policy::PollingBackoffPolicyArg;
use std::time::Duration;

/// The error type for wait policy creation.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("the poll interval ({0:?}) should be greater than zero")]
    InvalidInterval(Duration),
    #[error("the maximum wait ({0:?}) should be greater than zero")]
    InvalidMaximumWait(Duration),
    #[error("the multiplier ({0}) should be a non-negative number")]
    InvalidMultiplier(f64),
    #[error(transparent)]
    Backoff(#[from] crate::exponential_backoff::Error),
}

/// Controls the timing of wait loops.
///
/// Policies are immutable. Create them with [WaitPolicyBuilder], or use the
/// [default][WaitPolicy::default].
#[derive(Clone, Debug)]
pub struct WaitPolicy {
    maximum_wait: Duration,
    backoff: PollingBackoffPolicyArg,
}

impl WaitPolicy {
    /// The maximum time the loop waits for the condition to be met.
    pub fn maximum_wait(&self) -> Duration {
        self.maximum_wait
    }

    /// The time to sleep after the `attempt_count`-th poll.
    pub fn wait_period(&self, loop_start: std::time::Instant, attempt_count: u32) -> Duration {
        self.backoff.0.wait_period(loop_start, attempt_count)
    }

    /// Replaces the polling backoff policy.
    pub fn with_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff = v.into();
        self
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicyBuilder::new().clamp()
    }
}

/// Builds [WaitPolicy] instances.
///
/// The n-th sleep (counting from zero) is
/// `min(interval * multiplier^n, maximum_interval)`. Multipliers at or below
/// `1.0` disable the backoff, the loop polls at a fixed interval.
#[derive(Clone, Debug)]
pub struct WaitPolicyBuilder {
    interval: Duration,
    maximum_wait: Duration,
    multiplier: f64,
    maximum_interval: Duration,
}

impl WaitPolicyBuilder {
    /// Creates a builder with the default parameters.
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(2),
            maximum_wait: Duration::from_secs(5 * 60),
            multiplier: 1.0,
            maximum_interval: Duration::from_secs(30),
        }
    }

    /// Change the initial poll interval.
    pub fn with_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.interval = v.into();
        self
    }

    /// Change the maximum time to wait.
    pub fn with_maximum_wait<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_wait = v.into();
        self
    }

    /// Change the backoff multiplier.
    pub fn with_multiplier<V: Into<f64>>(mut self, v: V) -> Self {
        self.multiplier = v.into();
        self
    }

    /// Change the upper bound for the poll interval.
    pub fn with_maximum_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_interval = v.into();
        self
    }

    /// Creates the policy, validating the parameters.
    pub fn build(self) -> Result<WaitPolicy, Error> {
        if self.interval.is_zero() {
            return Err(Error::InvalidInterval(self.interval));
        }
        if self.maximum_wait.is_zero() {
            return Err(Error::InvalidMaximumWait(self.maximum_wait));
        }
        if self.multiplier.is_nan() || self.multiplier < 0.0 {
            return Err(Error::InvalidMultiplier(self.multiplier));
        }
        let backoff = self.backoff_builder().build()?;
        Ok(WaitPolicy {
            maximum_wait: self.maximum_wait,
            backoff: backoff.into(),
        })
    }

    /// Creates the policy, clamping the parameters to valid ranges.
    ///
    /// The interval and the maximum wait are at least one millisecond.
    pub fn clamp(self) -> WaitPolicy {
        let interval = self.interval.max(Duration::from_millis(1));
        let maximum_wait = self.maximum_wait.max(Duration::from_millis(1));
        let multiplier = if self.multiplier.is_nan() {
            1.0
        } else {
            self.multiplier
        };
        let maximum_interval = self.maximum_interval.max(interval);
        let builder = Self {
            interval,
            maximum_wait,
            multiplier,
            maximum_interval,
        };
        let backoff = builder.backoff_builder().clamp();
        WaitPolicy {
            maximum_wait,
            backoff: backoff.into(),
        }
    }

    fn backoff_builder(&self) -> ExponentialBackoffBuilder {
        let builder = ExponentialBackoffBuilder::new()
            .with_initial_delay(self.interval)
            .with_jitter(Duration::ZERO);
        if self.multiplier > 1.0 {
            builder
                .with_scaling(self.multiplier)
                .with_maximum_delay(self.maximum_interval)
        } else {
            builder
                .with_scaling(1.0)
                .with_maximum_delay(self.interval.max(self.maximum_interval))
        }
    }
}

impl Default for WaitPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
