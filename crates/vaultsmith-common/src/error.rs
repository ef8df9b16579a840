//! Error types for Vaultsmith
//!
//! Every error is scoped to a single reconcile attempt or a single property
//! resolution. None of them is fatal to the process; controllers translate
//! them into status updates and requeue decisions via [`Error::is_retryable`].

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Vaultsmith operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error (connectivity, conflict, rejected write)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// An existing object is owned by someone other than the requester
    #[error("{object} is not owned by {requester}")]
    AuthorizationDenied {
        /// namespace/name of the object that would have been overwritten
        object: String,
        /// kind/name of the resource that asked for the write
        requester: String,
    },

    /// A declared property names no source we know how to resolve
    #[error("unable to determine how to source property {property}")]
    UnresolvableSource {
        /// Name of the property
        property: String,
    },

    /// A generator declaration selects no known generator (or more than one)
    #[error("unable to determine property generator: {message}")]
    UnresolvableGenerator {
        /// What was wrong with the declaration
        message: String,
    },

    /// Validation error for declared specs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with the invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.kubernetes.properties")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl Error {
    /// Create an ownership denial for `object` requested by `requester`
    pub fn authorization_denied(object: impl Into<String>, requester: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            object: object.into(),
            requester: requester.into(),
        }
    }

    /// Create an unresolvable-source error for a property
    pub fn unresolvable_source(property: impl Into<String>) -> Self {
        Self::UnresolvableSource {
            property: property.into(),
        }
    }

    /// Create an unresolvable-generator error
    pub fn unresolvable_generator(msg: impl Into<String>) -> Self {
        Self::UnresolvableGenerator {
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration-shaped errors (validation, unresolvable sources, ownership
    /// denials) need a spec change before a retry can succeed. Kubernetes
    /// errors are retryable unless the API server rejected the request as
    /// malformed; conflicts (409) are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => ae.code == 409 || !(400..500).contains(&ae.code),
                _ => true,
            },
            Error::AuthorizationDenied { .. } => false,
            Error::UnresolvableSource { .. } => false,
            Error::UnresolvableGenerator { .. } => false,
            Error::Validation { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// True if the API server reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// True if the API server rejected a write because of a concurrent change
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 409)
    }
}
