//! Plugins: modules with startup and teardown steps

use doffy_di::{BoxError, Module, ModuleContainer};
use std::fmt::{self, Display, Formatter};

/// A unit of application functionality backed by a [`Module`].
///
/// # Example
/// ```no_run
/// use doffy::{Plugin, di::{BoxError, ContainerExt, Module, ModuleContainer, Provider}};
///
/// struct Users {
///     module: Module,
/// }
///
/// impl Plugin for Users {
///     fn module(&self) -> &Module {
///         &self.module
///     }
///
///     fn init(&self, container: &ModuleContainer) -> Result<(), BoxError> {
///         let _repo = container.resolve_as::<String>("user_repository")?;
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// Module definition of this plugin
    fn module(&self) -> &Module;

    /// Synchronous startup step.
    ///
    /// Runs after every asynchronous provider of the application is resolved,
    /// and after the startup steps of all imported modules.
    fn init(&self, _container: &ModuleContainer) -> Result<(), BoxError> {
        Ok(())
    }

    /// Teardown step, runs in reverse initialization order
    fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A plugin without startup or teardown steps
#[derive(Debug, Clone)]
pub struct ModulePlugin(Module);

impl ModulePlugin {
    /// Wraps a module
    #[inline]
    pub fn new(module: Module) -> Self {
        Self(module)
    }
}

impl From<Module> for ModulePlugin {
    #[inline]
    fn from(module: Module) -> Self {
        Self(module)
    }
}

impl Plugin for ModulePlugin {
    #[inline]
    fn module(&self) -> &Module {
        &self.0
    }
}

/// Lifecycle stage of a registered plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Validated and registered
    Registered,
    /// Waiting for its asynchronous providers
    Queued,
    /// Asynchronous providers are resolved
    AsyncResolved,
    /// Startup step succeeded
    Initialized,
    /// Every plugin of the application is initialized
    Ready,
    /// Teardown step ran
    Closed,
    /// A fatal startup or teardown error occurred
    Failed,
}

impl PluginState {
    /// Returns the lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Queued => "queued",
            Self::AsyncResolved => "async-resolved",
            Self::Initialized => "initialized",
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl Display for PluginState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
