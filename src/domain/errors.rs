use thiserror::Error;

/// Failure classification for order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{resource} not found: {}", join_ids(.ids))]
    NotFound { resource: &'static str, ids: Vec<i32> },

    #[error(
        "Insufficient stock for {item_name} (item {item_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        item_id: i32,
        item_name: String,
        requested: i32,
        available: i32,
    },

    #[error("Upstream service unreachable: {0}")]
    UpstreamUnavailable(String),

    /// A stock decrement failed after validation passed. `decremented` lists
    /// the items whose remote stock had already been reduced; those
    /// reductions are not undone.
    #[error("Stock update failed for item {item_id}: {reason}")]
    RemoteUpdateFailed {
        item_id: i32,
        reason: String,
        decremented: Vec<i32>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: i32) -> Self {
        DomainError::NotFound {
            resource,
            ids: vec![id],
        }
    }

    /// Stable name of the failure kind, as exposed to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::InvalidRequest(_) => "InvalidRequest",
            DomainError::NotFound { .. } => "NotFound",
            DomainError::InsufficientStock { .. } => "InsufficientStock",
            DomainError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            DomainError::RemoteUpdateFailed { .. } => "RemoteUpdateFailed",
            DomainError::Internal(_) => "Internal",
        }
    }
}

/// Outcome of a failed call through the remote service gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The remote service answered with a well-formed envelope reporting
    /// failure (`success: false` or no `data`).
    #[error("{resource} {id} not found: {message}")]
    NotFound {
        resource: &'static str,
        id: i32,
        message: String,
    },

    /// No usable answer: connection refused, timeout, 5xx or a body that is
    /// not a valid envelope.
    #[error("{service} service unreachable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
