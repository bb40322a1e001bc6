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

//! Polls the state of a resource until a condition is met.
//!
//! Many infrastructure operations complete asynchronously: creating an
//! instance returns immediately, and the instance reaches the `RUNNING` state
//! some time later. The [wait] function calls a predicate, which typically
//! fetches the resource and inspects its state, until the predicate returns
//! `true`, fails, or the [WaitPolicy] expires.
//!
//! The waiter has no knowledge of the resources. Predicates that detect an
//! unrecoverable state (say, the instance is `TERMINATED`) should return an
//! error, which stops the loop.
//!
//! # Example
//! ```
//! # use infra_gax::{context::Context, error::Error, wait_policy::WaitPolicyBuilder, waiter::wait};
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! use std::time::Duration;
//! let policy = WaitPolicyBuilder::new()
//!     .with_interval(Duration::from_millis(10))
//!     .clamp();
//! let mut states = vec!["RUNNING", "PROVISIONING", "PROVISIONING"];
//! wait(&Context::new(), &policy, async |_ctx| {
//!     let state = states.pop().unwrap_or("TERMINATED");
//!     match state {
//!         "RUNNING" => Ok(true),
//!         "TERMINATED" => Err(Error::http_status(409, "the instance terminated")),
//!         _ => Ok(false),
//!     }
//! })
//! .await?;
//! # Ok::<(), Error>(()) }).unwrap();
//! ```

use crate::context::Context;
use crate::error::Error;
use crate::wait_policy::WaitPolicy;

enum Outcome<E> {
    Succeeded,
    Failed(E),
    Interrupted(Error),
}

/// Polls `predicate` until it returns `Ok(true)`.
///
/// The predicate is called immediately, and then after each sleep prescribed
/// by `policy`. It receives a context derived from `ctx` that also expires
/// when the policy's maximum wait elapses. Predicates should pass this
/// context to any request they make.
///
/// The earlier of the caller's deadline and the maximum wait governs: a
/// caller deadline later than the maximum wait does not extend the wait.
/// A maximum wait too large to represent as a deadline never expires.
///
/// # Returns
/// * `Ok(())` once the predicate returns `Ok(true)`.
/// * Any error returned by the predicate, unchanged.
/// * A [timeout][Error::is_wait_timeout] if the policy expires first.
/// * A [cancellation][Error::is_canceled] or a
///   [deadline exceeded][Error::is_deadline_exceeded] error if `ctx` is
///   cancelled, or its deadline expires, before the policy does.
pub async fn wait<P, E>(ctx: &Context, policy: &WaitPolicy, mut predicate: P) -> Result<(), E>
where
    P: AsyncFnMut(&Context) -> Result<bool, E> + Send,
    E: From<Error>,
{
    let wait_ctx = ctx.with_wait_limit(policy.maximum_wait());
    let loop_start = tokio::time::Instant::now().into_std();
    let mut attempt_count = 0_u32;
    let outcome = loop {
        if let Err(e) = wait_ctx.check() {
            break Outcome::Interrupted(e);
        }
        attempt_count += 1;
        let poll = tokio::select! {
            biased;
            e = wait_ctx.done() => Err(Outcome::Interrupted(e)),
            r = predicate(&wait_ctx) => r.map_err(Outcome::Failed),
        };
        match poll {
            Ok(true) => break Outcome::Succeeded,
            Ok(false) => {}
            Err(outcome) => break outcome,
        }
        let delay = policy.wait_period(loop_start, attempt_count);
        tracing::debug!(attempt_count, ?delay, "condition not met, polling again");
        if let Err(e) = wait_ctx.sleep(delay).await {
            break Outcome::Interrupted(e);
        }
    };
    match outcome {
        Outcome::Succeeded => {
            tracing::debug!(attempt_count, "condition met");
            Ok(())
        }
        Outcome::Failed(e) => {
            tracing::debug!(attempt_count, "condition check failed");
            Err(e)
        }
        Outcome::Interrupted(e) => {
            tracing::debug!(attempt_count, kind = ?e.kind(), "wait interrupted: {e}");
            Err(E::from(e))
        }
    }
}
