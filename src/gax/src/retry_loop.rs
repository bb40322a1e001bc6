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

//! The retry executor.
//!
//! Wraps a single HTTP attempt and repeats it while the [RetryPolicy] allows.
//!
//! # Example
//! ```
//! # use infra_gax::{context::Context, error::Error, retry_policy::RetryPolicy};
//! # use infra_gax::retry_loop::retry_execute;
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let mut count = 0;
//! let response = retry_execute(
//!     &Context::new(),
//!     &http::Method::GET,
//!     &RetryPolicy::default(),
//!     async |_remaining| {
//!         count += 1;
//!         if count < 2 {
//!             return Err(Error::http_status(503, "try again"));
//!         }
//!         Ok("done")
//!     },
//! )
//! .await?;
//! assert_eq!(response, "done");
//! assert_eq!(count, 2);
//! # Ok::<(), Error>(()) }).unwrap();
//! ```

use crate::Result;
use crate::context::Context;
use crate::error::Error;
use crate::retry_policy::RetryPolicy;
use crate::retry_result::RetryResult;
use crate::retry_state::RetryState;
use http::Method;
use std::time::Duration;

/// Runs the retry loop for a given function.
///
/// This function calls `attempt` as long as (1) the context is not done,
/// (2) `attempt` has not returned a successful response, and (3) the retry
/// policy considers the last error retryable and has attempts left.
///
/// `attempt` receives the time left before the context deadline, if any, and
/// should use it to bound the transport timeout. Each attempt is also raced
/// against the context, so cancellation interrupts in-flight attempts.
///
/// In between calls the function sleeps the amount of time prescribed by the
/// policy. The sleep is interrupted if the context is done.
pub async fn retry_execute<F, R>(
    ctx: &Context,
    method: &Method,
    policy: &RetryPolicy,
    attempt: F,
) -> Result<R>
where
    F: AsyncFnMut(Option<Duration>) -> Result<R> + Send,
{
    retry_execute_with_callback(ctx, method, policy, attempt, |_, _, _| {}).await
}

/// Runs the retry loop for a given function with a callback for retries.
///
/// Same as [retry_execute]. The `on_retry` callback is called before
/// sleeping, with the attempt count, the error, and the delay.
pub async fn retry_execute_with_callback<F, OnRetry, R>(
    ctx: &Context,
    method: &Method,
    policy: &RetryPolicy,
    mut attempt: F,
    mut on_retry: OnRetry,
) -> Result<R>
where
    F: AsyncFnMut(Option<Duration>) -> Result<R> + Send,
    OnRetry: FnMut(u32, &Error, Duration) + Send,
{
    let mut state =
        RetryState::new(method.clone()).set_start(tokio::time::Instant::now().into_std());
    loop {
        ctx.check()?;
        state.attempt_count += 1;
        let error = match ctx.run(attempt(ctx.remaining())).await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        // Client-side failures caused by the context expiring report the
        // context error.
        if error.status_code() == 0 {
            ctx.check()?;
        }
        let error = match policy.on_error(&state, error) {
            RetryResult::Continue(e) => e,
            RetryResult::Exhausted(e) => {
                tracing::warn!(
                    attempt_count = state.attempt_count,
                    status_code = e.status_code(),
                    %method,
                    "retry attempts exhausted"
                );
                return Err(e);
            }
            RetryResult::Permanent(e) => return Err(e),
        };
        let delay = policy.on_failure(&state);
        tracing::debug!(
            attempt_count = state.attempt_count,
            status_code = error.status_code(),
            kind = ?error.kind(),
            ?delay,
            %method,
            "retrying request"
        );
        on_retry(state.attempt_count, &error, delay);
        ctx.sleep(delay).await?;
    }
}
