//! Error taxonomy and the safe categories exposed to callers.

use thiserror::Error;

/// Everything that can go wrong while serving a channel command.
#[derive(Debug, Error)]
pub enum ListcastError {
    /// A command targeted an id that no item carries.
    #[error("no item with id `{id}`")]
    NotFound { id: String },

    /// A request parameter was missing or failed to parse.
    #[error("malformed `{param}` parameter: {reason}")]
    MalformedInput { param: &'static str, reason: String },

    /// The external key-value store failed a load or save.
    #[error("list store unavailable for channel `{channel}`: {reason}")]
    StoreUnavailable { channel: String, reason: String },

    /// The external publish interface rejected or dropped an event.
    #[error("publish to channel `{channel}` failed: {reason}")]
    PublishFailed { channel: String, reason: String },

    /// The channel writer went away before answering.
    #[error("writer for channel `{channel}` stopped before replying")]
    WriterGone { channel: String },
}

impl ListcastError {
    pub fn malformed(param: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            param,
            reason: reason.into(),
        }
    }

    pub fn store(channel: &str, err: &anyhow::Error) -> Self {
        Self::StoreUnavailable {
            channel: channel.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

/// What a caller is allowed to learn about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeErrorCategory {
    NotFound,
    InvalidInput,
    Unavailable,
    Upstream,
    Internal,
}

impl SafeErrorCategory {
    /// Generic message with no internal detail in it.
    pub fn safe_message(&self) -> &'static str {
        match self {
            Self::NotFound => "Not Found",
            Self::InvalidInput => "Bad Request",
            Self::Unavailable => "Service Unavailable",
            Self::Upstream => "Bad Gateway",
            Self::Internal => "Internal Server Error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidInput => 400,
            Self::Unavailable => 503,
            Self::Upstream => 502,
            Self::Internal => 500,
        }
    }
}

/// Errors that know their [`SafeErrorCategory`].
pub trait Categorizable {
    fn category(&self) -> SafeErrorCategory;
}

impl Categorizable for ListcastError {
    fn category(&self) -> SafeErrorCategory {
        match self {
            Self::NotFound { .. } => SafeErrorCategory::NotFound,
            Self::MalformedInput { .. } => SafeErrorCategory::InvalidInput,
            Self::StoreUnavailable { .. } => SafeErrorCategory::Unavailable,
            Self::PublishFailed { .. } => SafeErrorCategory::Upstream,
            Self::WriterGone { .. } => SafeErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_messages_never_carry_detail() {
        let err = ListcastError::StoreUnavailable {
            channel: "groceries".into(),
            reason: "connection refused: 10.0.0.7:5432".into(),
        };

        let category = err.category();

        assert_eq!(category, SafeErrorCategory::Unavailable);
        assert_eq!(category.status_code(), 503);
        assert!(!category.safe_message().contains("10.0.0.7"));
        assert!(err.to_string().contains("10.0.0.7"));
    }

    #[test]
    fn categories_map_to_http_statuses() {
        let cases = [
            (ListcastError::NotFound { id: "x".into() }, 404),
            (ListcastError::malformed("checked", "not a boolean"), 400),
            (
                ListcastError::PublishFailed {
                    channel: "c".into(),
                    reason: "502".into(),
                },
                502,
            ),
            (ListcastError::WriterGone { channel: "c".into() }, 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.category().status_code(), status, "{err}");
        }
    }

    #[test]
    fn store_errors_keep_the_full_context_chain() {
        let err = anyhow::anyhow!("timed out").context("loading channel");
        let mapped = ListcastError::store("groceries", &err);
        assert!(mapped.to_string().contains("loading channel: timed out"));
    }
}
