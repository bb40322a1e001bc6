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

//! Cooperative cancellation and deadlines.
//!
//! Every suspension point in the retry and polling loops receives a
//! [Context]. The context combines a [CancellationToken] with an optional
//! deadline. Sleeping on a context returns early, with an error, as soon as
//! the token is cancelled or the deadline expires.
//!
//! # Example
//! ```
//! # use infra_gax::context::Context;
//! use std::time::Duration;
//! let parent = Context::new();
//! let child = parent.with_timeout(Duration::from_secs(30));
//! assert!(child.deadline().is_some());
//! parent.cancel();
//! assert!(child.is_cancelled());
//! ```

use crate::Result;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The reasons a [Context] is done.
///
/// These values are the [source][std::error::Error::source] of the errors
/// returned when a context interrupts an operation.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("wait policy exceeded after {0:?}")]
    WaitPolicyExceeded(Duration),
}

impl From<ContextError> for Error {
    fn from(value: ContextError) -> Self {
        match value {
            ContextError::Canceled => Error::canceled(value),
            ContextError::DeadlineExceeded | ContextError::WaitPolicyExceeded(_) => {
                Error::timeout(value)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Origin {
    Caller,
    WaitPolicy(Duration),
}

#[derive(Clone, Copy, Debug)]
struct Deadline {
    at: Instant,
    origin: Origin,
}

impl Deadline {
    fn expired(&self) -> ContextError {
        match self.origin {
            Origin::Caller => ContextError::DeadlineExceeded,
            Origin::WaitPolicy(maximum) => ContextError::WaitPolicyExceeded(maximum),
        }
    }

    // Ties go to the existing deadline, which is closer to the caller.
    fn earliest(current: Option<Self>, candidate: Self) -> Self {
        match current {
            Some(d) if d.at <= candidate.at => d,
            _ => candidate,
        }
    }
}

/// A cancellation token plus an optional deadline.
///
/// Contexts form a tree: derived contexts are cancelled when their parent is
/// cancelled, and never outlive their parent's deadline. Cancelling a derived
/// context does not affect the parent.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Deadline>,
}

impl Context {
    /// Creates a context without a deadline that is never cancelled, unless
    /// the application calls [cancel][Context::cancel].
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Creates a context driven by an existing cancellation token.
    ///
    /// # Example
    /// ```
    /// # use infra_gax::context::Context;
    /// use tokio_util::sync::CancellationToken;
    /// let token = CancellationToken::new();
    /// let context = Context::from_token(token.clone());
    /// token.cancel();
    /// assert!(context.is_cancelled());
    /// ```
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a context that expires after `timeout`, or earlier if this
    /// context expires first.
    ///
    /// Timeouts too large to represent as an [Instant] add no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derives a context that expires at `deadline`, or earlier if this
    /// context expires first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Deadline {
            at: deadline,
            origin: Origin::Caller,
        })
    }

    // Used by the waiter to layer the maximum wait over the caller's context.
    pub(crate) fn with_wait_limit(&self, maximum: Duration) -> Self {
        match Instant::now().checked_add(maximum) {
            Some(at) => self.derive(Deadline {
                at,
                origin: Origin::WaitPolicy(maximum),
            }),
            None => self.child(),
        }
    }

    fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    fn derive(&self, candidate: Deadline) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: Some(Deadline::earliest(self.deadline, candidate)),
        }
    }

    /// Cancels this context and any contexts derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if the context, or one of its ancestors, was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.map(|d| d.at)
    }

    /// The time left before the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    /// Returns an error if the context is cancelled or its deadline expired.
    ///
    /// # Example
    /// ```
    /// # use infra_gax::context::Context;
    /// let context = Context::new();
    /// assert!(context.check().is_ok());
    /// context.cancel();
    /// let err = context.check().unwrap_err();
    /// assert!(err.is_canceled(), "{err:?}");
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(ContextError::Canceled.into());
        }
        match self.deadline {
            Some(d) if d.at <= Instant::now() => Err(d.expired().into()),
            _ => Ok(()),
        }
    }

    /// Completes when the context is cancelled or its deadline expires.
    ///
    /// The returned error describes which of the two happened.
    pub async fn done(&self) -> Error {
        let Some(deadline) = self.deadline else {
            self.token.cancelled().await;
            return ContextError::Canceled.into();
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => ContextError::Canceled.into(),
            _ = tokio::time::sleep_until(deadline.at) => deadline.expired().into(),
        }
    }

    /// Sleeps for `delay`, returning early with an error if the context is
    /// done first.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            biased;
            e = self.done() => Err(e),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Runs `future` to completion, unless the context is done first.
    ///
    /// If the context is done the future is dropped, which stops any
    /// in-flight I/O it owns.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            e = self.done() => Err(e),
            r = future => r,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background() {
        let context = Context::new();
        assert!(context.deadline().is_none());
        assert!(context.remaining().is_none());
        assert!(context.check().is_ok());
        let start = Instant::now();
        context.sleep(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout() {
        let context = Context::new().with_timeout(Duration::from_secs(10));
        assert_eq!(context.remaining(), Some(Duration::from_secs(10)));

        let start = Instant::now();
        let err = context.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_deadline_exceeded(), "{err:?}");
        assert!(!err.is_wait_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(context.remaining(), Some(Duration::ZERO));

        let err = context.check().unwrap_err();
        assert!(err.is_deadline_exceeded(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_wins() {
        let parent = Context::new().with_timeout(Duration::from_secs(10));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let child = parent.with_wait_limit(Duration::from_secs(5));
        assert_eq!(child.remaining(), Some(Duration::from_secs(5)));
        let err = child.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_wait_timeout(), "{err:?}");
        assert!(parent.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_limit_after_caller() {
        let parent = Context::new().with_timeout(Duration::from_secs(5));
        let child = parent.with_wait_limit(Duration::from_secs(10));
        let err = child.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_deadline_exceeded(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_propagates_to_children() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        let sleeper = tokio::spawn({
            let child = child.clone();
            async move { child.sleep(Duration::from_secs(30)).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        parent.cancel();
        let err = sleeper.await.unwrap().unwrap_err();
        assert!(err.is_canceled(), "{err:?}");
        assert_eq!(
            err.metadata().get(crate::error::CAUSE_KEY),
            Some(&serde_json::json!("context canceled"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout() {
        let context = Context::new().with_timeout(Duration::MAX);
        assert!(context.deadline().is_none());
        assert!(context.check().is_ok());

        let parent = Context::new().with_timeout(Duration::from_secs(10));
        let child = parent.with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
        let child = parent.with_wait_limit(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
        let err = child.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_deadline_exceeded(), "{err:?}");

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_does_not_affect_parent() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn run() {
        let context = Context::new().with_timeout(Duration::from_secs(5));
        let got = context.run(async { Ok(42) }).await;
        assert_eq!(got.ok(), Some(42));

        let err = context
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(42)
            })
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded(), "{err:?}");
    }

    #[tokio::test]
    async fn run_cancelled() {
        let context = Context::new();
        context.cancel();
        let err = context
            .run(async { Ok::<i32, Error>(42) })
            .await
            .unwrap_err();
        assert!(err.is_canceled(), "{err:?}");
    }

    #[test]
    fn context_error() {
        let err = Error::from(ContextError::WaitPolicyExceeded(Duration::from_secs(1)));
        assert!(err.is_timeout(), "{err:?}");
        assert!(err.is_wait_timeout(), "{err:?}");
        assert_eq!(err.status_code(), 0);
    }
}
