//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "HTTP client for the timing record API."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use serde_json::Value;
use splitwatch_store::{StoreError, ValidationErrors};

/// Errors raised by [`crate::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The base URL could not be parsed or joined.
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Builder(String),
    /// No HTTP response was received.
    #[error("network error calling {url}: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Transport failure description.
        message: String,
    },
    /// The server answered with a non-success status.
    #[error("{status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
        /// `message` or `error` from the body, else the body text or reason.
        message: String,
        /// Parsed JSON body, when there was one.
        details: Option<Value>,
    },
    /// A success response body did not decode.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder failure description.
        message: String,
    },
}

impl ClientError {
    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    /// Per-field validation messages from a 400 body.
    pub fn validation_details(&self) -> Option<ValidationErrors> {
        let ClientError::Api {
            status: 400,
            details: Some(body),
            ..
        } = self
        else {
            return None;
        };
        let fields = body.get("details")?.as_object()?;
        let mut errors = ValidationErrors::default();
        for (field, messages) in fields {
            for message in messages.as_array().into_iter().flatten() {
                if let Some(text) = message.as_str() {
                    errors.push(field.clone(), text);
                }
            }
        }
        (!errors.is_empty()).then_some(errors)
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        if let Some(details) = err.validation_details() {
            return StoreError::Validation(details);
        }
        match err {
            ClientError::Decode { .. } => StoreError::Corrupt(err.to_string()),
            ClientError::InvalidUrl(_) | ClientError::Builder(_) => {
                StoreError::Configuration(err.to_string())
            }
            ClientError::Network { .. } | ClientError::Api { .. } => {
                StoreError::Unavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_request_details_become_validation_errors() {
        let err = ClientError::Api {
            status: 400,
            url: "http://localhost/api/stopwatch-records".into(),
            message: "Invalid record data".into(),
            details: Some(json!({
                "error": "Invalid record data",
                "details": { "duration": ["Number must be greater than or equal to 0"] }
            })),
        };
        assert_eq!(err.to_string(), "400: Invalid record data");
        match StoreError::from(err) {
            StoreError::Validation(errors) => assert_eq!(
                errors.messages("duration"),
                ["Number must be greater than or equal to 0"]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn network_failures_map_to_unavailable() {
        let err = ClientError::Network {
            url: "http://127.0.0.1:9/api/stopwatch-records".into(),
            message: "connection refused".into(),
        };
        assert!(err.is_network());
        assert_eq!(err.status(), None);
        assert!(StoreError::from(err).is_transport());
    }
}
