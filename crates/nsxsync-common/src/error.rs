//! Error types for NSX synchronization operations.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use thiserror::Error;

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while keeping the NSX backend in sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend object is already absent.
    ///
    /// Treated as success on delete and rename paths (idempotent deletes).
    #[error("Backend object not found: {resource}")]
    NotFound {
        /// Description of the missing object (e.g., "lswitch abc123").
        resource: String,
    },

    /// No logical switch on the network has spare port capacity.
    #[error("No logical switch with available ports for network {network_id} ({checked} checked)")]
    NoAvailableSwitch {
        /// The orchestrator network id.
        network_id: String,
        /// How many switches were examined.
        checked: usize,
    },

    /// More networks need a segment than there are free VNIs.
    #[error("{networks} networks need a VNI but only {available} are free")]
    InsufficientVnis {
        /// Number of networks without a segment.
        networks: usize,
        /// Number of unallocated VNIs.
        available: usize,
    },

    /// A backend API call failed.
    #[error("NSX API call failed: {operation}: {message}")]
    BackendApi {
        /// The operation that failed (e.g., "create_lswitch").
        operation: String,
        /// Error message.
        message: String,
    },

    /// A database operation failed.
    #[error("Database operation failed: {operation}: {message}")]
    Database {
        /// The operation that failed (e.g., "hget", "hset").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Allowed address pairs were requested on a port without port security.
    #[error("Port {port_id} has allowed address pairs but port security is disabled")]
    AddressPairsRequirePortSecurity {
        /// The orchestrator port id.
        port_id: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a backend API error.
    pub fn backend_api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendApi {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a database error.
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error means the backend object is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Returns true if this error is tolerated on update paths.
    ///
    /// Backend communication failures on renames and port updates must not
    /// abort the enclosing orchestrator transaction; the next reconciliation
    /// pass closes the inconsistency window.
    pub fn is_nonfatal_on_update(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound { .. } | SyncError::BackendApi { .. }
        )
    }
}
