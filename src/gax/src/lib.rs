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

//! Cloud infrastructure API helpers.
//!
//! This crate contains the types and functions used to complete
//! asynchronous infrastructure operations:
//!
//! - A structured [error] type, with a closed set of [kinds][error::ErrorKind].
//! - A [retry executor][retry_loop] that repeats idempotent requests on
//!   transient failures, with exponential backoff and jitter.
//! - A [waiter] that polls the state of a resource until some condition is
//!   met, or a [wait policy][wait_policy::WaitPolicy] expires.
//!
//! Both loops honor the cancellation and deadline in a [context::Context].

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping HTTP requests.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the retry and wait loops.
pub mod error;

pub mod backoff_policy;
pub mod context;
pub mod exponential_backoff;
pub mod http_client;
pub mod options;
pub mod polling_backoff_policy;
pub mod retry_loop;
pub mod retry_policy;
pub mod retry_result;
pub mod retry_state;
pub mod wait_policy;
pub mod waiter;

#[cfg(test)]
pub(crate) mod mock_rng;
