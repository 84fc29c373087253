//! Response classification: a pure function of `(status, headers, parsed body, node policy)`.
//! Kept separate from the executor so it can be exercised directly — classifying the same inputs
//! always yields the same outcome.

use http::HeaderMap;
use serde_json::Value;

use crate::error::Error;

/// The result of classifying one assembled response.
pub(crate) enum Outcome {
    Success,
    Retryable(Error),
    NonRetryable(Error),
}

/// Maps a response's status, headers, and body to a retry decision.
pub(crate) fn classify(status: u16, headers: &HeaderMap, body: &Value, retry_on_stale: bool) -> Outcome {
    match status {
        404 => return Outcome::NonRetryable(Error::document_not_found()),
        403 => return Outcome::NonRetryable(Error::unauthorized()),
        409 => return Outcome::Retryable(Error::conflict()),
        410 => return Outcome::Retryable(Error::node_gone()),
        _ => {}
    }

    if let Some(message) = body.get("Error").and_then(Value::as_str) {
        let message = body
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or(message)
            .to_string();
        return Outcome::NonRetryable(Error::server_message(message, false));
    }

    if body.get("IsStale").and_then(Value::as_bool) == Some(true) {
        return if retry_on_stale {
            Outcome::Retryable(Error::stale(true))
        } else {
            Outcome::NonRetryable(Error::stale(false))
        };
    }

    if matches!(status, 408 | 502 | 503 | 504) {
        let message = body
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("server reported a transient failure")
            .to_string();
        return if headers.contains_key("Database-Missing") {
            Outcome::NonRetryable(Error::server_message(message, false))
        } else {
            Outcome::Retryable(Error::server_message(message, true))
        };
    }

    Outcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> HeaderMap {
        HeaderMap::new()
    }

    #[test]
    fn classifies_404_as_non_retryable() {
        assert!(matches!(
            classify(404, &headers(), &json!({}), false),
            Outcome::NonRetryable(_)
        ));
    }

    #[test]
    fn classifies_409_as_retryable() {
        assert!(matches!(
            classify(409, &headers(), &json!({}), false),
            Outcome::Retryable(_)
        ));
    }

    #[test]
    fn classifies_stale_per_policy() {
        let body = json!({"IsStale": true});
        assert!(matches!(classify(200, &headers(), &body, true), Outcome::Retryable(_)));
        assert!(matches!(
            classify(200, &headers(), &body, false),
            Outcome::NonRetryable(_)
        ));
    }

    #[test]
    fn classifies_5xx_by_database_missing_header() {
        let mut with_header = HeaderMap::new();
        with_header.insert("Database-Missing", "yes".parse().unwrap());
        assert!(matches!(
            classify(503, &with_header, &json!({"Message": "down"}), false),
            Outcome::NonRetryable(_)
        ));
        assert!(matches!(
            classify(503, &headers(), &json!({"Message": "down"}), false),
            Outcome::Retryable(_)
        ));
    }

    #[test]
    fn classifies_error_body_as_non_retryable() {
        let body = json!({"Error": "System.Exception", "Message": "boom"});
        assert!(matches!(classify(500, &headers(), &body, false), Outcome::NonRetryable(_)));
    }

    #[test]
    fn status_specific_rows_take_priority_over_error_body() {
        // A 404 whose body also happens to carry an "Error"/"Message" pair should still classify
        // as the specific document-not-found outcome, not fall through to the generic server
        // error row.
        let body = json!({"Error": "DocumentDoesNotExistException", "Message": "boom"});
        let outcome = classify(404, &headers(), &body, false);
        assert!(matches!(outcome, Outcome::NonRetryable(e) if matches!(e.kind(), crate::error::ErrorKind::DocumentNotFound)));

        let body = json!({"Error": "ConcurrencyException", "Message": "conflict"});
        let outcome = classify(409, &headers(), &body, false);
        assert!(matches!(outcome, Outcome::Retryable(e) if matches!(e.kind(), crate::error::ErrorKind::Conflict)));
    }

    #[test]
    fn classifies_otherwise_as_success() {
        assert!(matches!(classify(200, &headers(), &json!({"Results": []}), false), Outcome::Success));
    }

    #[test]
    fn classification_is_pure() {
        let body = json!({"IsStale": true});
        let first = matches!(classify(200, &headers(), &body, true), Outcome::Retryable(_));
        let second = matches!(classify(200, &headers(), &body, true), Outcome::Retryable(_));
        assert_eq!(first, second);
    }
}
