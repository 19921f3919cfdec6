//! Main application entry point

use crate::{
    Config,
    Limit,
    error::Error,
    hooks::Hooks,
    manager::PluginManager,
    plugin::Plugin,
};
use doffy_di::{
    BoxError,
    Container,
    Context,
    EncapsulationMode,
    Module,
    Provider,
    RequestContainer,
    RootContainer,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// The entry point for assembling an application from modules.
///
/// # Example
/// ```no_run
/// use doffy::{App, di::{Lifetime, Module, Provider}};
///
/// #[derive(Default)]
/// struct UserRepository;
///
/// #[tokio::main]
/// async fn main() -> Result<(), doffy::Error> {
///     let mut app = App::new();
///
///     app.register_module(
///         Module::new("users", "1.0.0")
///             .with_provider(Provider::class::<UserRepository>("user_repository", Lifetime::Singleton))
///             .with_exports(["user_repository"])
///     )?;
///
///     app.run().await
/// }
/// ```
#[derive(Debug)]
pub struct App {
    manager: PluginManager,
    hooks: Hooks,
    config: Config,
    stop: CancellationToken,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an application with the default configuration
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            manager: PluginManager::with_config(&config),
            hooks: Hooks::new(),
            config,
            stop: CancellationToken::new(),
        }
    }

    /// Applies a configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.manager.policy().set_mode(config.encapsulation);
        self.manager.set_max_concurrency(config.max_concurrency);
        self.manager.set_async_timeout(config.async_timeout);
        self.config = config;
        self
    }

    /// Sets how unexported cross-module accesses are treated
    ///
    /// Default: [`EncapsulationMode::Disabled`]
    pub fn with_encapsulation(mut self, mode: EncapsulationMode) -> Self {
        self.set_encapsulation_mode(mode);
        self
    }

    /// Sets the parallelism of the asynchronous pre-warm
    ///
    /// Default: 10
    pub fn with_max_concurrency(mut self, limit: Limit<usize>) -> Self {
        self.config.max_concurrency = limit;
        self.manager.set_max_concurrency(limit);
        self
    }

    /// Sets a ceiling for the whole asynchronous pre-warm
    ///
    /// Default: `None`
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.config.async_timeout = Some(timeout);
        self.manager.set_async_timeout(Some(timeout));
        self
    }

    /// Switches the encapsulation mode, also while the application is running
    pub fn set_encapsulation_mode(&mut self, mode: EncapsulationMode) {
        self.config.encapsulation = mode;
        self.manager.policy().set_mode(mode);
    }

    /// Returns the current encapsulation mode
    #[inline]
    pub fn encapsulation_mode(&self) -> EncapsulationMode {
        self.manager.policy().mode()
    }

    /// Returns the current configuration
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a plugin
    pub fn register(&mut self, plugin: impl Plugin) -> Result<(), Error> {
        let name = plugin.module().name().to_owned();
        self.manager.register(plugin)?;
        self.hooks.run_on_register(&name);
        Ok(())
    }

    /// Registers a module without startup or teardown steps
    pub fn register_module(&mut self, module: Module) -> Result<(), Error> {
        let name = module.name().to_owned();
        self.manager.register_module(module)?;
        self.hooks.run_on_register(&name);
        Ok(())
    }

    /// Registers an application-wide provider in the root container
    pub fn provide(&self, provider: Provider) -> Result<(), Error> {
        self.manager.root().register(provider)?;
        Ok(())
    }

    /// Registers an application-wide instance decorator
    pub fn decorate<T>(&self, name: impl Into<String>, value: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        self.manager.decorators().decorate(name, value)
    }

    /// Returns an application-wide instance decorator downcast to `T`
    pub fn decorator<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.manager.decorators().instance_as(name)
    }

    /// Attaches an instance decorator to a registered module, visible to the
    /// module, its child modules and their requests
    pub fn decorate_module<T>(&self, module: &str, name: impl Into<String>, value: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        self.manager.decorate_module(module, name, value)
    }

    /// Registers a default request value copied into every request scope
    pub fn decorate_request<T>(&self, name: impl Into<String>, default: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        self.manager.decorators().decorate_request(name, default)
    }

    /// Registers a reply helper copied into every request scope
    pub fn decorate_reply<F>(&self, name: impl Into<String>, helper: F) -> Result<(), Error>
    where
        F: Send + Sync + 'static,
    {
        self.manager.decorators().decorate_reply(name, helper)
    }

    /// Adds a callback that receives the name of every registered module
    pub fn on_register<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_register(hook);
        self
    }

    /// Adds a callback that runs once every module is initialized
    pub fn on_ready<F, E>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.hooks.on_ready(hook);
        self
    }

    /// Adds a callback that runs after every module is shut down
    pub fn on_close<F, E>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.hooks.on_close(hook);
        self
    }

    /// Initializes every module and runs the ready hooks
    pub async fn start(&mut self) -> Result<(), Error> {
        let ctx = Context::from_token(self.stop.child_token());
        self.start_with_context(&ctx).await
    }

    /// Initializes every module under `ctx` and runs the ready hooks
    pub async fn start_with_context(&mut self, ctx: &Context) -> Result<(), Error> {
        self.manager.initialize_all(ctx).await?;
        self.hooks.run_on_ready()
    }

    /// Tears every module down and runs the close hooks.
    ///
    /// All teardown steps and close hooks run even if some fail.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        self.stop.cancel();

        let mut errors = match self.manager.shutdown() {
            Ok(()) => Vec::new(),
            Err(Error::Shutdown(errors)) => errors,
            Err(err) => vec![err],
        };
        errors.extend(self.hooks.run_on_close());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(errors))
        }
    }

    /// Returns a token that stops [`App::run`] and [`App::run_until`] when cancelled.
    ///
    /// Cancelling it during startup also cancels pending asynchronous providers.
    #[inline]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Starts the application, waits for Ctrl+C or the shutdown token and shuts down
    pub async fn run(self) -> Result<(), Error> {
        self.run_until(async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("unable to listen for shutdown signal: {err:#}");
            }
        })
        .await
    }

    /// Starts the application, waits for `signal` or the shutdown token and shuts down
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        tokio::select! {
            _ = signal => tracing::trace!("shutdown signal received"),
            _ = self.stop.cancelled() => tracing::trace!("shutdown requested"),
        }

        self.shutdown()
    }

    /// Creates a request container for a module
    pub fn request_scope(&self, module: &str) -> Result<RequestContainer, Error> {
        self.manager.request_scope(module)
    }

    /// Returns the plugin manager
    #[inline]
    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Returns the plugin manager
    #[inline]
    pub fn manager_mut(&mut self) -> &mut PluginManager {
        &mut self.manager
    }

    /// Returns the root container
    #[inline]
    pub fn root(&self) -> &Arc<RootContainer> {
        self.manager.root()
    }
}
