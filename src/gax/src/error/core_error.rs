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

use super::http_error::ErrorBody;
use crate::context::ContextError;
use http::HeaderMap;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The open key/value map attached to each [Error].
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The metadata key holding an HTTP payload that could not be parsed.
pub const RAW_PAYLOAD_KEY: &str = "raw";

/// The metadata key describing why a request was interrupted.
pub const CAUSE_KEY: &str = "cause";

/// The core error returned by the retry and polling loops.
///
/// Every failure that leaves this crate is one of a closed set of kinds, see
/// [ErrorKind]. The kind, together with the HTTP status code, is all the
/// information applications need to decide what to do next. Errors also carry
/// a human-readable message, an open set of metadata, and (for client-side
/// failures) the original error as their [source][std::error::Error::source].
///
/// Errors are immutable once created. They compare equal when their kind and
/// status code are equal, the message and metadata are informational.
///
/// # Example
/// ```
/// use infra_gax::error::{Error, ErrorKind};
/// match example_function() {
///     Err(e) if e.kind() == ErrorKind::HttpStatus && e.status_code() == 404 => {
///         println!("cannot find the thing: {e}");
///     }
///     Err(e) if e.is_timeout() => println!("not enough time {e}"),
///     Err(e) => println!("some other error {e}"),
///     Ok(_) => println!("success, how boring"),
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::http_status(404, "NOT FOUND"))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    status_code: u16,
    error_code: Option<String>,
    message: String,
    metadata: Metadata,
    headers: Option<HeaderMap>,
    source: Option<BoxError>,
}

/// The type of error held by an [Error] instance.
///
/// This is a closed set, applications can exhaustively match on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No HTTP response was received, e.g. DNS or connection failures.
    Network,
    /// A deadline expired before the request completed.
    Timeout,
    /// The caller canceled the request.
    Canceled,
    /// The service returned a non-2xx HTTP response.
    HttpStatus,
    /// The response could not be decoded.
    Deserialization,
}

/// The part of an [Error] used to compare errors and make retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorClass {
    /// The HTTP status code, `0` when no HTTP response was received.
    pub status_code: u16,
    /// The error kind.
    pub kind: ErrorKind,
}

impl Error {
    /// Creates an error representing a failure to reach the service.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use infra_gax::error::{Error, ErrorKind};
    /// let error = Error::network("connection refused");
    /// assert_eq!(error.kind(), ErrorKind::Network);
    /// assert_eq!(error.status_code(), 0);
    /// assert!(error.source().is_some());
    /// ```
    pub fn network<T: Into<BoxError>>(source: T) -> Self {
        Self::client_side(ErrorKind::Network, source.into())
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use infra_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::interrupted(ErrorKind::Timeout, source.into())
    }

    /// Creates an error representing a cancellation.
    ///
    /// # Example
    /// ```
    /// use infra_gax::error::Error;
    /// let error = Error::canceled("the application is shutting down");
    /// assert!(error.is_canceled());
    /// assert_eq!(error.status_code(), 0);
    /// ```
    pub fn canceled<T: Into<BoxError>>(source: T) -> Self {
        Self::interrupted(ErrorKind::Canceled, source.into())
    }

    /// Creates an error representing a deserialization problem.
    ///
    /// # Example
    /// ```
    /// use infra_gax::error::Error;
    /// let error = Error::deser("unexpected end of input");
    /// assert!(error.is_deserialization());
    /// ```
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::client_side(ErrorKind::Deserialization, source.into())
    }

    /// Creates an error with an HTTP status and message.
    ///
    /// This is mostly useful in mocks. Errors received from the service are
    /// created with [from_http_response][Error::from_http_response].
    ///
    /// # Example
    /// ```
    /// use infra_gax::error::{Error, ErrorKind};
    /// let error = Error::http_status(503, "try again later");
    /// assert_eq!(error.kind(), ErrorKind::HttpStatus);
    /// assert_eq!(error.status_code(), 503);
    /// assert_eq!(error.message(), "try again later");
    /// ```
    pub fn http_status<M: Into<String>>(status_code: u16, message: M) -> Self {
        Self {
            kind: ErrorKind::HttpStatus,
            status_code,
            error_code: None,
            message: message.into(),
            metadata: Metadata::new(),
            headers: None,
            source: None,
        }
    }

    /// Classifies a non-2xx HTTP response.
    ///
    /// If the payload is a structured error (see [ErrorBody]) the error code,
    /// message, and any additional fields are copied into the error. Otherwise
    /// the payload is preserved verbatim in the `raw` metadata key.
    ///
    /// # Example
    /// ```
    /// use infra_gax::error::{Error, ErrorKind};
    /// let payload = bytes::Bytes::from_static(b"<html>bad gateway</html>");
    /// let error = Error::from_http_response(502, http::HeaderMap::new(), payload);
    /// assert_eq!(error.kind(), ErrorKind::HttpStatus);
    /// assert_eq!(error.status_code(), 502);
    /// assert_eq!(error.metadata().get("raw"), Some(&serde_json::json!("<html>bad gateway</html>")));
    /// ```
    pub fn from_http_response(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        match ErrorBody::parse(&payload) {
            Some(body) => {
                let (error_code, message, metadata) = body.into_parts();
                let message = message.unwrap_or_else(|| reason(status_code));
                Self {
                    kind: ErrorKind::HttpStatus,
                    status_code,
                    error_code,
                    message,
                    metadata,
                    headers: Some(headers),
                    source: None,
                }
            }
            None => {
                let mut metadata = Metadata::new();
                metadata.insert(
                    RAW_PAYLOAD_KEY.to_string(),
                    String::from_utf8_lossy(&payload).into_owned().into(),
                );
                Self {
                    kind: ErrorKind::HttpStatus,
                    status_code,
                    error_code: None,
                    message: reason(status_code),
                    metadata,
                    headers: Some(headers),
                    source: None,
                }
            }
        }
    }

    /// Converts any failure into an [Error].
    ///
    /// Classification happens once, where the failure first appears. If
    /// `source` already is an [Error] it is returned unchanged. Otherwise:
    /// - transport timeouts become [ErrorKind::Timeout],
    /// - decoding failures become [ErrorKind::Deserialization],
    /// - anything else is a failure to reach the service,
    ///   [ErrorKind::Network].
    ///
    /// # Example
    /// ```
    /// use infra_gax::error::{Error, ErrorKind};
    /// let original = Error::http_status(429, "slow down");
    /// let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(original);
    /// let error = Error::classify(boxed);
    /// assert_eq!(error.kind(), ErrorKind::HttpStatus);
    /// assert_eq!(error.status_code(), 429);
    /// ```
    pub fn classify<T: Into<BoxError>>(source: T) -> Self {
        let source = match source.into().downcast::<Error>() {
            Ok(e) => return *e,
            Err(source) => source,
        };
        if let Some(e) = source.downcast_ref::<ContextError>() {
            return Error::from(*e);
        }
        if let Some(e) = source.downcast_ref::<reqwest::Error>() {
            if e.is_timeout() {
                return Self::timeout(source);
            }
            if e.is_decode() {
                return Self::deser(source);
            }
            return Self::network(source);
        }
        if let Some(e) = source.downcast_ref::<std::io::Error>() {
            if e.kind() == std::io::ErrorKind::TimedOut {
                return Self::timeout(source);
            }
            return Self::network(source);
        }
        if source.is::<tokio::time::error::Elapsed>() {
            return Self::timeout(source);
        }
        if source.is::<serde_json::Error>() {
            return Self::deser(source);
        }
        Self::network(source)
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The HTTP status code, `0` if no HTTP response was received.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The service-specific error code, if the service returned one.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// The human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Additional details about the error.
    ///
    /// For service errors these are the fields in the error payload other
    /// than the error code and message. If the payload could not be parsed
    /// it is included in the `raw` key. For interrupted requests the `cause`
    /// key describes what interrupted the request.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The HTTP headers of the response, if any.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// The values used to compare errors and make retry decisions.
    pub fn class(&self) -> ErrorClass {
        ErrorClass {
            status_code: self.status_code,
            kind: self.kind,
        }
    }

    /// The service could not be reached.
    ///
    /// # Troubleshooting
    ///
    /// This indicates a problem establishing a connection or completing the
    /// request: DNS failures, refused or reset connections, or proxies that
    /// drop the request. The request may or may not have reached the service.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, ErrorKind::Network)
    }

    /// The request could not be completed before a deadline.
    ///
    /// Use [is_deadline_exceeded][Error::is_deadline_exceeded] and
    /// [is_wait_timeout][Error::is_wait_timeout] to find out which deadline
    /// expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// The request was canceled by the caller.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }

    /// The service returned an error response.
    pub fn is_http_status(&self) -> bool {
        matches!(self.kind, ErrorKind::HttpStatus)
    }

    /// The response could not be deserialized.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause for deserialization problems are bugs in the
    /// client library and (rarely) bugs in the service.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// The deadline in the caller's [Context] expired.
    ///
    /// [Context]: crate::context::Context
    pub fn is_deadline_exceeded(&self) -> bool {
        self.is_timeout()
            && matches!(
                self.context_error(),
                Some(ContextError::DeadlineExceeded)
            )
    }

    /// A [wait][crate::waiter::wait] loop expired its
    /// [WaitPolicy][crate::wait_policy::WaitPolicy] before the condition was
    /// satisfied.
    ///
    /// # Troubleshooting
    ///
    /// The resource may still reach the desired state. Applications can wait
    /// again, or extend the maximum wait duration in the policy.
    pub fn is_wait_timeout(&self) -> bool {
        self.is_timeout()
            && matches!(
                self.context_error(),
                Some(ContextError::WaitPolicyExceeded(_))
            )
    }

    fn context_error(&self) -> Option<&ContextError> {
        self.source
            .as_ref()
            .and_then(|e| e.downcast_ref::<ContextError>())
    }

    fn client_side(kind: ErrorKind, source: BoxError) -> Self {
        Self {
            kind,
            status_code: 0,
            error_code: None,
            message: source.to_string(),
            metadata: Metadata::new(),
            headers: None,
            source: Some(source),
        }
    }

    fn interrupted(kind: ErrorKind, source: BoxError) -> Self {
        let mut error = Self::client_side(kind, source);
        error
            .metadata
            .insert(CAUSE_KEY.to_string(), error.message.clone().into());
        error
    }
}

fn reason(status_code: u16) -> String {
    http::StatusCode::from_u16(status_code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown HTTP status")
        .to_string()
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.class() == other.class()
    }
}

impl Eq for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.error_code) {
            (ErrorKind::Network, _) => {
                write!(f, "cannot reach the service: {}", self.message)
            }
            (ErrorKind::Timeout, _) => {
                write!(f, "the request exceeded its deadline: {}", self.message)
            }
            (ErrorKind::Canceled, _) => write!(f, "the request was canceled: {}", self.message),
            (ErrorKind::Deserialization, _) => {
                write!(f, "cannot deserialize the response: {}", self.message)
            }
            (ErrorKind::HttpStatus, Some(code)) => write!(
                f,
                "the service reports an error with HTTP status {} and code {code}: {}",
                self.status_code, self.message
            ),
            (ErrorKind::HttpStatus, None) => {
                write!(
                    f,
                    "the service reports an error with HTTP status {}: {}",
                    self.status_code, self.message
                )?;
                match self.metadata.get(RAW_PAYLOAD_KEY) {
                    Some(serde_json::Value::String(raw)) if !raw.is_empty() => {
                        write!(f, ", payload: {raw}")
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}
