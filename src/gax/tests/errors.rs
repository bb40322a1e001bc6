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

#[cfg(test)]
mod tests {
    use gax::context::ContextError;
    use gax::error::{Error, ErrorClass, ErrorKind};
    use infra_gax as gax;
    use serde_json::json;
    use std::error::Error as _;
    use test_case::test_case;

    static_assertions::assert_impl_all!(Error: Send, Sync, std::error::Error);
    static_assertions::assert_impl_all!(ErrorKind: Copy, Send, Sync, std::hash::Hash);
    static_assertions::assert_impl_all!(ContextError: Copy, Send, Sync, std::error::Error);

    #[test_case(std::io::ErrorKind::ConnectionRefused, ErrorKind::Network)]
    #[test_case(std::io::ErrorKind::ConnectionReset, ErrorKind::Network)]
    #[test_case(std::io::ErrorKind::TimedOut, ErrorKind::Timeout)]
    fn classify_io(input: std::io::ErrorKind, want: ErrorKind) {
        let err = Error::classify(std::io::Error::new(input, "test-only"));
        assert_eq!(err.kind(), want);
        assert_eq!(err.status_code(), 0);
        let source = err.source().and_then(|e| e.downcast_ref::<std::io::Error>());
        assert!(
            matches!(source, Some(e) if e.kind() == input),
            "{err:?}"
        );
    }

    #[test]
    fn classify_is_idempotent() {
        let original = Error::http_status(503, "try again later");
        let first = Error::classify(original);
        let second = Error::classify(first);
        assert_eq!(second.kind(), ErrorKind::HttpStatus);
        assert_eq!(second.status_code(), 503);
        assert_eq!(second.message(), "try again later");
    }

    #[test]
    fn anyhow_round_trip() {
        let payload = json!({"errorCode": "quota", "message": "too many servers", "limit": 8});
        let original = Error::from_http_response(
            429,
            http::HeaderMap::new(),
            bytes::Bytes::from(payload.to_string()),
        );
        let wrapped = anyhow::Error::from(original);
        let got = wrapped.downcast::<Error>().expect("downcast should succeed");
        assert_eq!(
            got.class(),
            ErrorClass {
                status_code: 429,
                kind: ErrorKind::HttpStatus
            }
        );
        assert_eq!(got.error_code(), Some("quota"));
        assert_eq!(got.metadata().get("limit"), Some(&json!(8)));
    }

    #[test]
    fn context_errors() {
        let err = Error::from(ContextError::Canceled);
        assert!(err.is_canceled(), "{err:?}");
        assert!(!err.is_deadline_exceeded(), "{err:?}");

        let err = Error::from(ContextError::DeadlineExceeded);
        assert!(err.is_timeout(), "{err:?}");
        assert!(err.is_deadline_exceeded(), "{err:?}");
        assert!(!err.is_wait_timeout(), "{err:?}");

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(ContextError::Canceled);
        let err = Error::classify(boxed);
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }

    #[test]
    fn equality_ignores_details() {
        let a = Error::http_status(404, "instance not found");
        let b = Error::http_status(404, "network not found");
        assert_eq!(a, b);
        assert_ne!(a, Error::http_status(409, "instance not found"));
        assert_ne!(Error::network("a"), Error::deser("a"));
    }
}
