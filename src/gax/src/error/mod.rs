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

mod core_error;
pub use core_error::*;

/// Parsing of the error payloads returned by the service.
///
/// The infrastructure API returns errors as JSON objects with an `errorCode`,
/// a `message`, and any number of additional fields. Some proxies and older
/// endpoints wrap the same object under a top-level `error` key. The types in
/// this module handle both.
pub mod http_error;
