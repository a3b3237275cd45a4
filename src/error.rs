use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::ErrorPayload;

/// Closed set of semantic failure codes surfaced to the UI. Unrecognized
/// server codes collapse into `UnknownError` rather than growing the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "NOT_LIVREUR")]
    NotLivreur,
    #[serde(rename = "PROFILE_NOT_FOUND")]
    ProfileNotFound,
    #[serde(rename = "PENDING_APPROVAL")]
    PendingApproval,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "ACCOUNT_INACTIVE")]
    AccountInactive,
    #[serde(rename = "UNKNOWN_ERROR")]
    UnknownError,
}

/// Remedial action the UI can offer alongside a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    CompleteProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SuggestedAction>,
    /// Account-status text forwarded verbatim from the server for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ClassifiedError {
    pub fn not_livreur() -> Self {
        Self {
            code: ErrorCode::NotLivreur,
            detail: "you must be signed in as a courier to access deliveries".to_string(),
            action: None,
            status: None,
        }
    }

    pub fn profile_not_found(detail: Option<String>) -> Self {
        Self {
            code: ErrorCode::ProfileNotFound,
            detail: detail
                .unwrap_or_else(|| "courier profile not found; complete your enrollment".to_string()),
            action: Some(SuggestedAction::CompleteProfile),
            status: None,
        }
    }

    fn unknown(detail: Option<String>) -> Self {
        Self {
            code: ErrorCode::UnknownError,
            detail: detail
                .unwrap_or_else(|| "something went wrong while fetching deliveries".to_string()),
            action: None,
            status: None,
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail)
    }
}

/// Maps a raw gateway failure payload onto the closed error taxonomy.
/// Never fails: a missing payload or an unmatched code degrades to
/// `UNKNOWN_ERROR`, keeping the server's detail text when present.
pub fn classify(payload: Option<&ErrorPayload>) -> ClassifiedError {
    let Some(payload) = payload else {
        return ClassifiedError::unknown(None);
    };

    match payload.code.as_deref() {
        Some("pending") => ClassifiedError {
            code: ErrorCode::PendingApproval,
            detail: payload
                .detail
                .clone()
                .unwrap_or_else(|| "your account is awaiting approval".to_string()),
            action: None,
            status: payload.status.clone(),
        },
        Some("rejected") => ClassifiedError {
            code: ErrorCode::Rejected,
            detail: payload
                .detail
                .clone()
                .unwrap_or_else(|| "your account application was rejected".to_string()),
            action: None,
            status: payload.status.clone(),
        },
        Some("account_inactive") => ClassifiedError {
            code: ErrorCode::AccountInactive,
            detail: payload
                .detail
                .clone()
                .unwrap_or_else(|| "your account is deactivated".to_string()),
            action: None,
            status: None,
        },
        Some("profile_not_found") => ClassifiedError::profile_not_found(payload.detail.clone()),
        _ => ClassifiedError::unknown(payload.detail.clone()),
    }
}

/// Failure of a store operation, as recorded into store state and returned
/// to the caller. All variants are recoverable; retrying is always allowed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{0}")]
    Classified(ClassifiedError),

    /// Untyped per-operation failure text (profile, position, statistics and
    /// the other non-listing operations bypass the classifier).
    #[error("{0}")]
    Operation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The store was reset while this operation was in flight; its outcome
    /// was discarded without mutating state.
    #[error("operation outcome discarded after store reset")]
    Stale,
}

impl StoreError {
    pub fn detail(&self) -> String {
        self.to_string()
    }

    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            StoreError::Classified(err) => Some(err),
            _ => None,
        }
    }
}
