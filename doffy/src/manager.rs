//! Orchestration of module registration, startup and teardown

use crate::{
    Config,
    Limit,
    decorator::DecoratorRegistry,
    error::Error,
    graph::ModuleGraph,
    plugin::{ModulePlugin, Plugin, PluginState},
};
use doffy_di::{
    Container,
    Context,
    EncapsulationPolicy,
    Module,
    ModuleContainer,
    RequestContainer,
    RootContainer,
};
use indexmap::IndexMap;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Semaphore, task::JoinSet, time::Instant};
use tracing::Instrument;

struct Entry {
    plugin: Arc<dyn Plugin>,
    container: Arc<ModuleContainer>,
    state: PluginState,
}

/// Registers plugins and drives them through startup and teardown.
///
/// Startup sorts modules by their imports, resolves every asynchronous
/// provider in parallel and then runs the synchronous startup steps one by one
/// in dependency order.
///
/// # Example
/// ```no_run
/// use doffy::{PluginManager, di::{Context, Module}};
///
/// # async fn docs() -> Result<(), doffy::Error> {
/// let mut manager = PluginManager::new();
/// manager.register_module(Module::new("database", "1.0.0"))?;
/// manager.register_module(Module::new("users", "1.0.0").with_imports(["database"]))?;
///
/// manager.initialize_all(&Context::new()).await?;
/// assert_eq!(manager.initialization_order(), ["database", "users"]);
/// # Ok(())
/// # }
/// ```
pub struct PluginManager {
    graph: ModuleGraph,
    plugins: IndexMap<String, Entry>,
    prefixes: IndexMap<String, String>,
    order: Vec<String>,
    root: Arc<RootContainer>,
    policy: Arc<EncapsulationPolicy>,
    decorators: Arc<DecoratorRegistry>,
    max_concurrency: Limit<usize>,
    async_timeout: Option<Duration>,
    initialized: bool,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("modules", &self.plugins.keys().collect::<Vec<_>>())
            .field("order", &self.order)
            .field("policy", &self.policy)
            .field("max_concurrency", &self.max_concurrency)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Default for PluginManager {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Creates a manager with a fresh root container and the default configuration
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a manager with a fresh root container
    pub fn with_config(config: &Config) -> Self {
        Self::with_root(
            Arc::new(RootContainer::new()),
            Arc::new(EncapsulationPolicy::new(config.encapsulation)),
            config,
        )
    }

    /// Creates a manager on top of an existing root container and policy
    pub fn with_root(root: Arc<RootContainer>, policy: Arc<EncapsulationPolicy>, config: &Config) -> Self {
        Self {
            graph: ModuleGraph::new(),
            plugins: IndexMap::new(),
            prefixes: IndexMap::new(),
            order: Vec::new(),
            root,
            policy,
            decorators: Arc::default(),
            max_concurrency: config.max_concurrency,
            async_timeout: config.async_timeout,
            initialized: false,
        }
    }

    /// Sets the parallelism of the asynchronous pre-warm
    pub fn set_max_concurrency(&mut self, limit: Limit<usize>) {
        self.max_concurrency = limit;
    }

    /// Sets the ceiling for the asynchronous pre-warm
    pub fn set_async_timeout(&mut self, timeout: Option<Duration>) {
        self.async_timeout = timeout;
    }

    /// Registers a bare module
    pub fn register_module(&mut self, module: Module) -> Result<(), Error> {
        self.register(ModulePlugin::new(module))
    }

    /// Validates a plugin's module, creates its container and adds it to the graph.
    ///
    /// Nothing is registered if any step fails.
    pub fn register(&mut self, plugin: impl Plugin) -> Result<(), Error> {
        self.register_arc(Arc::new(plugin))
    }

    /// Same as [`PluginManager::register`] for a shared plugin
    pub fn register_arc(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), Error> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }

        let module = Arc::new(plugin.module().clone());
        let name = module.name().to_owned();
        if self.graph.contains(&name) {
            return Err(Error::ModuleAlreadyRegistered(name));
        }

        let container = ModuleContainer::from_module(
            module.clone(),
            self.root.clone(),
            self.policy.clone()
        )?;
        self.graph.add_module(module.clone())?;

        if module.is_global() {
            self.root.add_global(&container);
        }
        self.prefixes.insert(name.clone(), module.full_prefix());

        tracing::debug!(
            module = %name,
            version = %module.version(),
            providers = module.providers().len(),
            "module registered"
        );

        self.plugins.insert(name, Entry {
            plugin,
            container,
            state: PluginState::Registered,
        });
        Ok(())
    }

    /// Sorts modules, pre-warms asynchronous providers and runs startup steps.
    ///
    /// - Graph errors abort before any provider is touched.
    /// - Every asynchronous provider is resolved even if others fail;
    ///   all failures are reported together in [`Error::AsyncInitialization`].
    /// - Startup steps run only after every asynchronous provider succeeded,
    ///   strictly in dependency order, stopping at the first failure.
    ///
    /// Can run successfully only once.
    pub async fn initialize_all(&mut self, ctx: &Context) -> Result<(), Error> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }

        let span = tracing::info_span!("initialize_all", modules = self.plugins.len());
        async {
            let started = Instant::now();

            let sorted = self.graph.topological_sort()?;
            self.order = sorted.iter().map(|m| m.name().to_owned()).collect();
            self.initialized = true;
            self.wire_imports();

            let ctx = match self.async_timeout {
                Some(timeout) => ctx.with_timeout(timeout),
                None => ctx.child(),
            };
            self.resolve_async_providers(&ctx).await?;
            self.init_plugins()?;

            for entry in self.plugins.values_mut() {
                entry.state = PluginState::Ready;
            }
            tracing::info!(elapsed = ?started.elapsed(), "all modules are ready");
            Ok::<_, Error>(())
        }
        .instrument(span)
        .await
    }

    fn wire_imports(&self) {
        for name in &self.order {
            let Some(entry) = self.plugins.get(name) else { continue };
            for import in entry.container.module().import_names() {
                if let Some(imported) = self.plugins.get(import) {
                    entry.container.add_import(imported.container.clone());
                }
            }
        }
    }

    async fn resolve_async_providers(&mut self, ctx: &Context) -> Result<(), Error> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency.permits()));
        let mut tasks = JoinSet::new();

        for name in &self.order {
            let Some(entry) = self.plugins.get_mut(name) else { continue };
            entry.state = PluginState::Queued;

            let async_providers = entry.container
                .module()
                .providers()
                .iter()
                .filter(|p| p.is_async())
                .map(|p| p.name().to_owned());

            for provider in async_providers {
                let container = entry.container.clone();
                let semaphore = semaphore.clone();
                let ctx = ctx.clone();
                let module = name.clone();
                let span = tracing::debug_span!("async_provider", module = %module, provider = %provider);

                tasks.spawn(async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            let started = Instant::now();
                            let result = container.resolve_with_context(&provider, &ctx).await;
                            tracing::debug!(elapsed = ?started.elapsed(), ok = result.is_ok(), "async provider resolved");
                            result.map(|_| ())
                        }
                        Err(err) => Err(doffy_di::Error::other(err)),
                    };
                    (module, provider, result)
                }.instrument(span));
            }
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(()))) => {}
                Ok((module, provider, Err(source))) => {
                    tracing::error!(module = %module, provider = %provider, "async provider failed: {source}");
                    if let Some(entry) = self.plugins.get_mut(&module) {
                        entry.state = PluginState::Failed;
                    }
                    errors.push(Error::AsyncProvider { module, provider, source });
                }
                Err(join_err) => {
                    tracing::error!("async provider task failed: {join_err}");
                    errors.push(Error::Di(doffy_di::Error::other(join_err)));
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::AsyncInitialization(errors));
        }

        for entry in self.plugins.values_mut() {
            entry.state = PluginState::AsyncResolved;
        }
        Ok(())
    }

    fn init_plugins(&mut self) -> Result<(), Error> {
        for name in &self.order {
            let Some(entry) = self.plugins.get_mut(name) else { continue };
            if let Err(source) = entry.plugin.init(&entry.container) {
                tracing::error!(module = %name, "module init failed: {source}");
                entry.state = PluginState::Failed;
                return Err(Error::Init {
                    module: name.clone(),
                    source,
                });
            }
            entry.state = PluginState::Initialized;
            tracing::debug!(module = %name, "module initialized");
        }
        Ok(())
    }

    /// Runs teardown steps in reverse initialization order.
    ///
    /// Every initialized module is torn down even if some fail;
    /// failures are logged and returned together in [`Error::Shutdown`].
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let mut errors = Vec::new();

        for name in self.order.iter().rev() {
            let Some(entry) = self.plugins.get_mut(name) else { continue };
            if !matches!(entry.state, PluginState::Initialized | PluginState::Ready) {
                continue;
            }
            match entry.plugin.shutdown() {
                Ok(()) => {
                    entry.state = PluginState::Closed;
                    tracing::debug!(module = %name, "module shut down");
                }
                Err(source) => {
                    tracing::error!(module = %name, "module shutdown failed: {source}");
                    entry.state = PluginState::Failed;
                    errors.push(Error::ModuleShutdown {
                        module: name.clone(),
                        source,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(errors))
        }
    }

    /// Creates a request container for a module with registered decorator defaults applied
    pub fn request_scope(&self, module: &str) -> Result<RequestContainer, Error> {
        let container = self.container(module).ok_or_else(|| Error::ModuleNotFound(module.into()))?;
        let request = container.create_request_scope();
        self.decorators.apply(&request);
        Ok(request)
    }

    /// Attaches an instance decorator to a registered module
    pub fn decorate_module<T>(&self, module: &str, name: impl Into<String>, value: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        let container = self.container(module).ok_or_else(|| Error::ModuleNotFound(module.into()))?;
        container.decorate(name, value)?;
        Ok(())
    }

    /// Returns the normalized route prefix of a module, empty if it has none
    pub fn prefix(&self, module: &str) -> Option<&str> {
        self.prefixes.get(module).map(String::as_str)
    }

    /// Returns module names in initialization order, empty before initialization
    #[inline]
    pub fn initialization_order(&self) -> &[String] {
        &self.order
    }

    /// Returns the lifecycle stage of a module
    pub fn state(&self, module: &str) -> Option<PluginState> {
        self.plugins.get(module).map(|e| e.state)
    }

    /// Returns the container of a module
    pub fn container(&self, module: &str) -> Option<&Arc<ModuleContainer>> {
        self.plugins.get(module).map(|e| &e.container)
    }

    /// Returns a registered plugin
    pub fn plugin(&self, module: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(module).map(|e| &e.plugin)
    }

    /// Returns the module graph
    #[inline]
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Returns the root container
    #[inline]
    pub fn root(&self) -> &Arc<RootContainer> {
        &self.root
    }

    /// Returns the shared encapsulation policy
    #[inline]
    pub fn policy(&self) -> &Arc<EncapsulationPolicy> {
        &self.policy
    }

    /// Returns the request and reply decorator defaults
    #[inline]
    pub fn decorators(&self) -> &Arc<DecoratorRegistry> {
        &self.decorators
    }

    /// Returns `true` once startup has passed the graph check
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the number of registered modules
    #[inline]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if no modules are registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
