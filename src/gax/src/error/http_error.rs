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

use super::Metadata;
use serde_json::Value;

/// The structured error payload returned by the service.
///
/// # Example
/// ```
/// # use infra_gax::error::http_error::ErrorBody;
/// let body = ErrorBody::parse(br#"{"errorCode": "quota", "message": "too many servers", "limit": 8}"#)
///     .expect("payload is a structured error");
/// assert_eq!(body.error_code(), Some("quota"));
/// assert_eq!(body.message(), Some("too many servers"));
/// assert_eq!(body.metadata().get("limit"), Some(&serde_json::json!(8)));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorBody {
    error_code: Option<String>,
    message: Option<String>,
    metadata: Metadata,
}

// The wire representation, `errorCode` is a string in most services, but
// some use integers.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBody {
    #[serde(default)]
    error_code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    metadata: Metadata,
}

impl ErrorBody {
    /// Parses an HTTP error payload.
    ///
    /// Returns `None` if the payload is not a JSON object, or if the object
    /// contains neither an `errorCode` nor a `message` field. Such payloads
    /// are reported verbatim, see [Error::from_http_response].
    ///
    /// [Error::from_http_response]: crate::error::Error::from_http_response
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let value = serde_json::from_slice::<Value>(payload).ok()?;
        let value = match value {
            Value::Object(mut map) if matches!(map.get("error"), Some(Value::Object(_))) => {
                map.remove("error")?
            }
            Value::Object(map) => Value::Object(map),
            _ => return None,
        };
        let raw = serde_json::from_value::<RawBody>(value).ok()?;
        let error_code = match raw.error_code {
            None => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        if error_code.is_none() && raw.message.is_none() {
            return None;
        }
        Some(Self {
            error_code,
            message: raw.message,
            metadata: raw.metadata,
        })
    }

    /// The service-specific error code.
    ///
    /// Some services use numeric codes, these are returned in their decimal
    /// representation.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// The human-readable description.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Any other fields in the payload.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Option<String>, Metadata) {
        (self.error_code, self.message, self.metadata)
    }
}
