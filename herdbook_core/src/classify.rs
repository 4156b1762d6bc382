//! Failure classification.
//!
//! Maps a transport failure into a closed taxonomy of error kinds and drives
//! user notification and logging. Pure with respect to business state: it
//! reads the failure, publishes one notice, and returns.

use std::collections::HashMap;

use herdbook_api::ApiError;
use serde_json::Value;

use crate::notify::{Notice, NotificationSink};

/// Closed taxonomy of user-facing failure kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400: the submitted data failed server-side validation.
    Validation,
    /// 401: the session is missing or expired. No redirect happens here.
    Unauthenticated,
    /// 403: the caller lacks permission.
    Forbidden,
    /// 404.
    NotFound,
    /// 408 or a client-side timeout.
    Timeout,
    /// 409 with a `dependencies` map: the delete is blocked by related records.
    DependencyConflict,
    /// 409 whose message mentions "version": the record changed concurrently.
    VersionConflict,
    /// Any other 409, typically a unique-constraint violation.
    UniqueConflict,
    /// 429.
    RateLimit,
    /// 5xx.
    Server,
    /// The request never got an HTTP response.
    Network,
    Unknown,
}

/// Classifies a failure without side effects.
pub fn classify(err: &ApiError) -> ErrorKind {
    match err {
        ApiError::Timeout { .. } => ErrorKind::Timeout,
        ApiError::Network { .. } => ErrorKind::Network,
        ApiError::Status { status, body, .. } => match status {
            400 => ErrorKind::Validation,
            401 => ErrorKind::Unauthenticated,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            409 => classify_conflict(body.as_ref()),
            429 => ErrorKind::RateLimit,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        },
        ApiError::Decode { .. } | ApiError::InvalidUrl { .. } => ErrorKind::Unknown,
    }
}

/// Classifies, logs with the `context` label, and publishes exactly one
/// notice. `overrides` substitutes the notice text per HTTP status. Never
/// panics; this is a terminal consumer.
pub fn report(
    err: &ApiError,
    context: &str,
    overrides: &HashMap<u16, String>,
    sink: &dyn NotificationSink,
) -> ErrorKind {
    let kind = classify(err);
    let message = overrides
        .get(&err.status())
        .cloned()
        .unwrap_or_else(|| default_message(kind, err));

    let notice = match kind {
        ErrorKind::DependencyConflict | ErrorKind::VersionConflict | ErrorKind::RateLimit => {
            tracing::warn!(context, status = err.status(), ?kind, "{err}");
            Notice::warning(message)
        }
        _ => {
            tracing::error!(context, status = err.status(), ?kind, "{err}");
            Notice::error(message)
        }
    };
    sink.publish(notice);
    kind
}

fn classify_conflict(body: Option<&Value>) -> ErrorKind {
    if dependencies(body).is_some() {
        return ErrorKind::DependencyConflict;
    }
    // Wire-compat convention: the server signals an optimistic-lock failure
    // only through prose containing "version".
    let mentions_version = messages(body)
        .iter()
        .any(|m| m.to_lowercase().contains("version"));
    if mentions_version {
        ErrorKind::VersionConflict
    } else {
        ErrorKind::UniqueConflict
    }
}

fn default_message(kind: ErrorKind, err: &ApiError) -> String {
    match kind {
        ErrorKind::Validation => {
            let joined = messages(err.body()).join("; ");
            if joined.is_empty() {
                "The submitted data is invalid.".to_string()
            } else {
                joined
            }
        }
        ErrorKind::Unauthenticated => "Your session has expired. Please sign in again.".to_string(),
        ErrorKind::Forbidden => "You do not have permission to perform this action.".to_string(),
        ErrorKind::NotFound => "The requested record was not found.".to_string(),
        ErrorKind::Timeout => "The server took too long to respond. Please try again.".to_string(),
        ErrorKind::DependencyConflict => {
            let deps = dependencies(err.body()).unwrap_or_default();
            format!("Cannot delete: blocked by {}.", dependency_phrase(&deps))
        }
        ErrorKind::VersionConflict => {
            "This record was changed by someone else. Reload it and try again.".to_string()
        }
        ErrorKind::UniqueConflict => {
            let joined = messages(err.body()).join("; ");
            if joined.is_empty() {
                "A record with these details already exists.".to_string()
            } else {
                joined
            }
        }
        ErrorKind::RateLimit => "Too many requests. Please slow down.".to_string(),
        ErrorKind::Server => "The server encountered an error. Please try again later.".to_string(),
        ErrorKind::Network => network_message(err),
        ErrorKind::Unknown => "Something went wrong.".to_string(),
    }
}

fn network_message(err: &ApiError) -> String {
    let aborted = match err {
        ApiError::Network { message, .. } => {
            let lower = message.to_lowercase();
            lower.contains("abort") || lower.contains("cancel")
        }
        _ => false,
    };
    if aborted {
        "The request was interrupted.".to_string()
    } else {
        "Cannot reach the server. Check your connection.".to_string()
    }
}

/// Extracts the `message` field of an error body, which the server sends as
/// either a string or an array of strings.
fn messages(body: Option<&Value>) -> Vec<String> {
    match body {
        Some(Value::Object(map)) => match map.get("message") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        },
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Extracts the `dependencies` count map of a blocking-delete conflict body.
fn dependencies(body: Option<&Value>) -> Option<Vec<(String, u64)>> {
    let deps = body?.as_object()?.get("dependencies")?.as_object()?;
    Some(
        deps.iter()
            .map(|(name, count)| (name.clone(), count.as_u64().unwrap_or(0)))
            .collect(),
    )
}

fn dependency_phrase(deps: &[(String, u64)]) -> String {
    if deps.is_empty() {
        return "related records".to_string();
    }
    deps.iter()
        .map(|(name, count)| format!("{count} {}", pluralized(name, *count)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The server sends plural collection names ("treatments"); singularize for
/// a count of one.
fn pluralized(name: &str, count: u64) -> String {
    if count == 1 {
        name.strip_suffix('s').unwrap_or(name).to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{BufferedSink, Severity};
    use serde_json::json;

    fn status_error(status: u16, body: Option<Value>) -> ApiError {
        ApiError::Status {
            status,
            status_text: String::new(),
            body,
            url: "http://test/animals".to_string(),
        }
    }

    fn no_overrides() -> HashMap<u16, String> {
        HashMap::new()
    }

    #[test]
    fn decision_table() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Unauthenticated),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (408, ErrorKind::Timeout),
            (409, ErrorKind::UniqueConflict),
            (429, ErrorKind::RateLimit),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
            (418, ErrorKind::Unknown),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(&status_error(status, None)), expected, "{status}");
        }
    }

    #[test]
    fn timeout_and_network_variants() {
        let timeout = ApiError::Timeout {
            url: "http://test".to_string(),
        };
        assert_eq!(classify(&timeout), ErrorKind::Timeout);

        let network = ApiError::Network {
            url: "http://test".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(classify(&network), ErrorKind::Network);
    }

    #[test]
    fn conflict_with_dependencies_map() {
        let err = status_error(
            409,
            Some(json!({"dependencies": {"treatments": 3, "vaccinations": 1}})),
        );
        assert_eq!(classify(&err), ErrorKind::DependencyConflict);
    }

    #[test]
    fn conflict_mentioning_version() {
        let err = status_error(409, Some(json!({"message": "Stale Version supplied"})));
        assert_eq!(classify(&err), ErrorKind::VersionConflict);
    }

    #[test]
    fn generic_conflict_without_markers() {
        let err = status_error(409, Some(json!({"message": "code already in use"})));
        assert_eq!(classify(&err), ErrorKind::UniqueConflict);
    }

    #[test]
    fn dependency_counts_are_enumerated_and_pluralized() {
        let sink = BufferedSink::new();
        let err = status_error(
            409,
            Some(json!({"dependencies": {"treatments": 3, "vaccinations": 1}})),
        );
        let kind = report(&err, "animals.delete", &no_overrides(), &sink);
        assert_eq!(kind, ErrorKind::DependencyConflict);

        let notices = sink.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Warning);
        assert!(notices[0].message.contains("3 treatments"));
        assert!(notices[0].message.contains("1 vaccination"));
        assert!(!notices[0].message.contains("1 vaccinations"));
    }

    #[test]
    fn validation_messages_are_joined() {
        let sink = BufferedSink::new();
        let err = status_error(
            400,
            Some(json!({"message": ["name is required", "earTag must be unique"]})),
        );
        report(&err, "animals.create", &no_overrides(), &sink);

        let notices = sink.drain();
        assert_eq!(
            notices[0].message,
            "name is required; earTag must be unique"
        );
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[test]
    fn version_conflict_is_a_warning() {
        let sink = BufferedSink::new();
        let err = status_error(409, Some(json!({"message": "version mismatch"})));
        report(&err, "animals.update", &no_overrides(), &sink);

        let notices = sink.drain();
        assert_eq!(notices[0].severity, Severity::Warning);
        assert!(notices[0].message.contains("changed by someone else"));
    }

    #[test]
    fn overrides_replace_the_default_text() {
        let sink = BufferedSink::new();
        let overrides =
            HashMap::from([(404u16, "This lot has already been closed.".to_string())]);
        let err = status_error(404, None);
        report(&err, "lots.update", &overrides, &sink);

        assert_eq!(sink.drain()[0].message, "This lot has already been closed.");
    }

    #[test]
    fn network_message_distinguishes_abort() {
        let aborted = ApiError::Network {
            url: "http://test".to_string(),
            message: "operation aborted by caller".to_string(),
        };
        assert!(default_message(ErrorKind::Network, &aborted).contains("interrupted"));

        let refused = ApiError::Network {
            url: "http://test".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(default_message(ErrorKind::Network, &refused).contains("Cannot reach"));
    }

    #[test]
    fn weird_bodies_never_panic() {
        let sink = BufferedSink::new();
        let bodies = [
            None,
            Some(json!(null)),
            Some(json!("plain text")),
            Some(json!({"message": 42})),
            Some(json!({"dependencies": "not a map"})),
            Some(json!({"dependencies": {"treatments": "three"}})),
        ];
        for body in bodies {
            report(&status_error(409, body), "x", &no_overrides(), &sink);
        }
        assert_eq!(sink.drain().len(), 6);
    }
}
