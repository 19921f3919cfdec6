//! Application lifecycle hooks

use crate::error::Error;
use doffy_di::BoxError;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

type RegisterHook = Arc<dyn Fn(&str) + Send + Sync>;
type LifecycleHook = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Callbacks invoked at application milestones
#[derive(Default, Clone)]
pub struct Hooks {
    on_register: Vec<RegisterHook>,
    on_ready: Vec<LifecycleHook>,
    on_close: Vec<LifecycleHook>,
}

impl Debug for Hooks {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_register", &self.on_register.len())
            .field("on_ready", &self.on_ready.len())
            .field("on_close", &self.on_close.len())
            .finish()
    }
}

impl Hooks {
    /// Creates an empty set of hooks
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback that receives the name of every registered module
    pub fn on_register<F>(&mut self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_register.push(Arc::new(hook));
    }

    /// Adds a callback that runs once every module is initialized.
    /// A failure aborts startup.
    pub fn on_ready<F, E>(&mut self, hook: F)
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.on_ready.push(Arc::new(move || hook().map_err(Into::into)));
    }

    /// Adds a callback that runs after every module is shut down
    pub fn on_close<F, E>(&mut self, hook: F)
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.on_close.push(Arc::new(move || hook().map_err(Into::into)));
    }

    pub(crate) fn run_on_register(&self, module: &str) {
        for hook in &self.on_register {
            hook(module);
        }
    }

    /// Runs ready hooks in registration order, stopping at the first failure
    pub(crate) fn run_on_ready(&self) -> Result<(), Error> {
        for hook in &self.on_ready {
            hook().map_err(|source| Error::Hook { hook: "on_ready", source })?;
        }
        Ok(())
    }

    /// Runs every close hook and returns the failures
    pub(crate) fn run_on_close(&self) -> Vec<Error> {
        self.on_close
            .iter()
            .filter_map(|hook| hook().err())
            .map(|source| {
                tracing::error!("on_close hook failed: {source}");
                Error::Hook { hook: "on_close", source }
            })
            .collect()
    }
}
