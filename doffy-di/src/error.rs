//! Describes dependency injection errors

use crate::module::ValidationError;
use std::{error::Error as StdError, time::Duration};

/// A boxed error returned by user-supplied constructors and hooks
pub type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

/// Errors produced while registering or resolving services
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A name was registered twice in the same container
    #[error("Services Error: service '{0}' is already registered")]
    AlreadyRegistered(String),

    /// An instance decorator was attached twice under the same name
    #[error("Services Error: decorator '{0}' already exists")]
    DecoratorExists(String),

    /// No container in the chain knows the requested name
    #[error("Services Error: service '{name}' is not registered in {scope}")]
    NotRegistered {
        /// Requested service
        name: String,
        /// Container where resolution started
        scope: String,
    },

    /// Encapsulation policy rejected a cross-module access
    #[error("Services Error: module '{from}' cannot access unexported provider '{service}' from module '{to}'")]
    AccessDenied {
        /// Requesting module
        from: String,
        /// Module owning the service
        to: String,
        /// Unexported service
        service: String,
    },

    /// An asynchronous provider did not finish before its deadline
    #[error("Services Error: async provider '{name}' exceeded its deadline ({timeout:?})")]
    DeadlineExceeded {
        /// Provider name
        name: String,
        /// Budget the provider had
        timeout: Duration,
    },

    /// The caller cancelled the resolution context
    #[error("Services Error: resolution of '{0}' was cancelled")]
    Cancelled(String),

    /// An asynchronous provider was resolved through the synchronous path
    /// before it had been pre-warmed
    #[error("Services Error: async provider '{0}' is not initialized yet, resolve it with a context first")]
    AsyncNotReady(String),

    /// The resolved instance is not of the requested type
    #[error("Services Error: service '{name}' cannot be resolved as {expected}")]
    TypeMismatch {
        /// Requested service
        name: String,
        /// Requested type
        expected: &'static str,
    },

    /// A lifetime string or tag did not match any known lifetime
    #[error("Services Error: unknown lifetime '{0}'")]
    UnknownLifetime(String),

    /// An encapsulation mode string did not match any known mode
    #[error("Services Error: unknown encapsulation mode '{0}'")]
    UnknownMode(String),

    /// Construction of a service failed
    #[error("Services Error: failed to create service '{name}': {source}")]
    ResolveFailed {
        /// Service whose construction failed
        name: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A module definition is malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Any other error raised by a user-supplied constructor
    #[error("{0}")]
    Other(BoxError),
}

impl Error {
    /// Wraps an arbitrary error raised by a constructor
    #[inline]
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    #[inline]
    pub(crate) fn not_registered(name: &str, scope: &str) -> Self {
        Self::NotRegistered {
            name: name.into(),
            scope: scope.into(),
        }
    }

    #[inline]
    pub(crate) fn resolve_failed(name: &str, source: Error) -> Self {
        Self::ResolveFailed {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, skipping construction wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::ResolveFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` if an asynchronous provider ran out of time
    #[inline]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root_cause(), Self::DeadlineExceeded { .. })
    }

    /// Returns `true` if resolution was cancelled by the caller
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled(_))
    }

    /// Returns `true` if encapsulation policy blocked the access
    #[inline]
    pub fn is_access_denied(&self) -> bool {
        matches!(self.root_cause(), Self::AccessDenied { .. })
    }

    /// Returns `true` if the service is unknown to the container chain
    #[inline]
    pub fn is_not_registered(&self) -> bool {
        matches!(self.root_cause(), Self::NotRegistered { .. })
    }
}

impl From<&'static str> for Error {
    #[inline]
    fn from(msg: &'static str) -> Self {
        Self::Other(msg.into())
    }
}

impl From<String> for Error {
    #[inline]
    fn from(msg: String) -> Self {
        Self::Other(msg.into())
    }
}
