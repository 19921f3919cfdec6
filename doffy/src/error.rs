//! Module graph and orchestration errors

use doffy_di::BoxError;

/// Errors produced while registering, initializing or shutting down modules
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Container or module definition error
    #[error(transparent)]
    Di(#[from] doffy_di::Error),

    /// Two modules share a name
    #[error("Module Error: module '{0}' is already registered")]
    ModuleAlreadyRegistered(String),

    /// No module is registered under the name
    #[error("Module Error: module '{0}' not found")]
    ModuleNotFound(String),

    /// An import names a module that was never registered
    #[error("Graph Error: module '{module}' depends on non-existent module '{dependency}'")]
    MissingDependency {
        /// Importing module
        module: String,
        /// Unregistered import
        dependency: String,
    },

    /// Imports form a cycle
    #[error("Graph Error: circular dependency detected at module '{module}': {}", .path.join(" -> "))]
    CircularDependency {
        /// Module where the cycle was re-entered
        module: String,
        /// Modules along the cycle, first and last equal
        path: Vec<String>,
    },

    /// A module reaches a provider that none of its imports exports
    #[error("Graph Error: module '{module}' attempts to access provider '{provider}' not exported by any imported module")]
    ExportNotVisible {
        /// Requesting module
        module: String,
        /// Provider it tried to reach
        provider: String,
    },

    /// One or more asynchronous providers failed during pre-warm
    #[error("Startup Error: async provider initialization failed: {}", join(.0))]
    AsyncInitialization(Vec<Error>),

    /// A single asynchronous provider failed
    #[error("Startup Error: async provider '{provider}' in module '{module}' failed: {source}")]
    AsyncProvider {
        /// Owning module
        module: String,
        /// Failed provider
        provider: String,
        /// Resolution error
        #[source]
        source: doffy_di::Error,
    },

    /// The startup step of a module failed
    #[error("Startup Error: module '{module}' init failed: {source}")]
    Init {
        /// Failed module
        module: String,
        /// Error returned by the plugin
        #[source]
        source: BoxError,
    },

    /// One or more modules failed to shut down
    #[error("Shutdown Error: {}", join(.0))]
    Shutdown(Vec<Error>),

    /// The teardown step of a module failed
    #[error("Shutdown Error: module '{module}' shutdown failed: {source}")]
    ModuleShutdown {
        /// Failed module
        module: String,
        /// Error returned by the plugin
        #[source]
        source: BoxError,
    },

    /// An application hook failed
    #[error("Hook Error: {hook} hook failed: {source}")]
    Hook {
        /// Hook kind
        hook: &'static str,
        /// Error returned by the hook
        #[source]
        source: BoxError,
    },

    /// Initialization was requested more than once
    #[error("Startup Error: modules are already initialized")]
    AlreadyInitialized,

    /// A decorator with this name is already registered
    #[error("Decorator Error: decorator '{0}' already exists")]
    DecoratorExists(String),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Returns `true` if any nested error is an async provider deadline
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            Self::Di(err) | Self::AsyncProvider { source: err, .. } => err.is_deadline_exceeded(),
            Self::AsyncInitialization(errors) | Self::Shutdown(errors) => errors.iter().any(Self::is_deadline_exceeded),
            _ => false,
        }
    }

    /// Returns `true` if any nested error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Di(err) | Self::AsyncProvider { source: err, .. } => err.is_cancelled(),
            Self::AsyncInitialization(errors) | Self::Shutdown(errors) => errors.iter().any(Self::is_cancelled),
            _ => false,
        }
    }

    /// Returns `true` if this is a missing import or an import cycle
    #[inline]
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Self::MissingDependency { .. } | Self::CircularDependency { .. })
    }

    /// Returns nested errors of an aggregate, or this error alone
    pub fn errors(&self) -> &[Error] {
        match self {
            Self::AsyncInitialization(errors) | Self::Shutdown(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}
