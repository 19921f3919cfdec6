//! Dependency Injection containers and tools

use crate::{Context, Lifetime, error::Error, provider::{Instance, Provider}};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::{
    any::type_name,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::{Arc, OnceLock},
};

pub use self::{
    module::ModuleContainer,
    request::RequestContainer,
    root::RootContainer,
};

pub mod module;
pub mod request;
pub mod root;

/// A resolver that maps service names to instances, chained to a parent.
///
/// Implemented by [`RootContainer`], [`ModuleContainer`] and [`RequestContainer`].
/// Resolution checks local registrations first and then walks up the chain;
/// the first container that knows the name constructs and caches the instance
/// according to the provider [`Lifetime`].
pub trait Container: Send + Sync {
    /// Human-readable name of this container used in errors
    fn scope_name(&self) -> String;

    /// Registers a provider in this container
    fn register(&self, provider: Provider) -> Result<(), Error>;

    /// Returns `true` if `name` can be resolved from this container or its chain.
    ///
    /// Does not construct anything and does not consult the encapsulation policy.
    fn has(&self, name: &str) -> bool;

    /// Finds the container that owns `name`.
    ///
    /// Returns `Ok(None)` if nobody in the chain knows the name.
    #[doc(hidden)]
    fn lookup(&self, name: &str) -> Result<Option<Lookup<'_>>, Error>;

    /// Returns this container as a module container, if it is one
    #[inline]
    fn as_module(&self) -> Option<&ModuleContainer> {
        None
    }

    /// Resolves a service without suspending.
    ///
    /// Asynchronous providers must have been resolved with a context before, e.g. by
    /// the orchestrator pre-warm, otherwise [`Error::AsyncNotReady`] is returned.
    fn resolve(&self, name: &str) -> Result<Instance, Error> {
        match self.lookup(name)? {
            Some(lookup) => lookup.finish_sync(),
            None => Err(Error::not_registered(name, &self.scope_name())),
        }
    }

    /// Resolves a service, awaiting asynchronous providers under `ctx`
    fn resolve_with_context<'a>(
        &'a self,
        name: &'a str,
        ctx: &'a Context
    ) -> BoxFuture<'a, Result<Instance, Error>> {
        Box::pin(async move {
            match self.lookup(name)? {
                Some(lookup) => lookup.finish(ctx).await,
                None => Err(Error::not_registered(name, &self.scope_name())),
            }
        })
    }
}

impl Debug for dyn Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope_name())
    }
}

/// The container that owns a service found during lookup
#[doc(hidden)]
pub enum Owner<'a> {
    /// The container the lookup started in, or one of its ancestors
    Borrowed(&'a dyn Container),
    /// A container reached through an import or a global link
    Shared(Arc<dyn Container>),
}

impl Owner<'_> {
    #[inline]
    fn as_dyn(&self) -> &dyn Container {
        match self {
            Owner::Borrowed(c) => *c,
            Owner::Shared(c) => c.as_ref(),
        }
    }
}

/// Result of a successful lookup
#[doc(hidden)]
pub enum Lookup<'a> {
    /// An instance that needs no construction
    Ready(Instance),
    /// A service that must be taken from cache or constructed by its owner
    Construct {
        /// The registered service
        service: Arc<ServiceDefinition>,
        /// Container its factory resolves dependencies against
        owner: Owner<'a>,
        /// Whether the instance is kept for later calls
        cache: bool,
    },
}

impl Lookup<'_> {
    fn finish_sync(self) -> Result<Instance, Error> {
        match self {
            Lookup::Ready(instance) => Ok(instance),
            Lookup::Construct { service, owner, cache } => service.resolve_sync(owner.as_dyn(), cache),
        }
    }

    async fn finish(self, ctx: &Context) -> Result<Instance, Error> {
        match self {
            Lookup::Ready(instance) => Ok(instance),
            Lookup::Construct { service, owner, cache } => service.resolve(owner.as_dyn(), ctx, cache).await,
        }
    }
}

/// A registered provider together with its cached instance
#[doc(hidden)]
pub struct ServiceDefinition {
    provider: Provider,
    instance: OnceLock<Instance>,
}

impl Debug for ServiceDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("provider", &self.provider)
            .field("cached", &self.instance.get().is_some())
            .finish()
    }
}

impl ServiceDefinition {
    #[inline]
    fn new(provider: Provider) -> Self {
        Self { provider, instance: OnceLock::new() }
    }

    /// Returns the provider
    #[inline]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    #[inline]
    fn cached(&self, cache: bool) -> Option<Instance> {
        if cache { self.instance.get().cloned() } else { None }
    }

    #[inline]
    fn store(&self, created: Result<Instance, Error>, cache: bool) -> Result<Instance, Error> {
        if !cache {
            return created;
        }
        let created = created.map_err(|err| Error::resolve_failed(self.provider.name(), err))?;
        // the first instance stored wins, concurrent constructions are discarded
        Ok(self.instance.get_or_init(|| created).clone())
    }

    fn resolve_sync(&self, owner: &dyn Container, cache: bool) -> Result<Instance, Error> {
        if let Some(instance) = self.cached(cache) {
            return Ok(instance);
        }
        let created = self.provider.resolve_sync(owner);
        self.store(created, cache)
    }

    async fn resolve(&self, owner: &dyn Container, ctx: &Context, cache: bool) -> Result<Instance, Error> {
        if let Some(instance) = self.cached(cache) {
            return Ok(instance);
        }
        let created = self.provider.resolve(owner, ctx).await;
        self.store(created, cache)
    }
}

/// Registered services of a single container
#[derive(Debug, Default)]
pub(crate) struct ServiceMap {
    inner: RwLock<HashMap<String, Arc<ServiceDefinition>>>,
}

impl ServiceMap {
    pub(crate) fn insert(&self, provider: Provider) -> Result<(), Error> {
        let mut services = self.inner.write();
        if services.contains_key(provider.name()) {
            return Err(Error::AlreadyRegistered(provider.name().into()));
        }
        services.insert(provider.name().into(), Arc::new(ServiceDefinition::new(provider)));
        Ok(())
    }

    /// Inserts every provider or none of them
    pub(crate) fn insert_all<'p>(&self, providers: impl IntoIterator<Item = &'p Provider>) -> Result<(), Error> {
        let mut services = self.inner.write();
        let mut pending: Vec<&Provider> = Vec::new();
        for provider in providers {
            if services.contains_key(provider.name()) || pending.iter().any(|p| p.name() == provider.name()) {
                return Err(Error::AlreadyRegistered(provider.name().into()));
            }
            pending.push(provider);
        }
        for provider in pending {
            services.insert(provider.name().into(), Arc::new(ServiceDefinition::new(provider.clone())));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn get(&self, name: &str) -> Option<Arc<ServiceDefinition>> {
        self.inner.read().get(name).cloned()
    }

    #[inline]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}

/// Registration and typed resolution helpers available on every container
pub trait ContainerExt: Container {
    /// Registers a pre-built singleton instance
    fn register_value<T>(&self, name: impl Into<String>, value: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        self.register(Provider::value(name, value))
    }

    /// Registers a factory with an explicit lifetime
    fn register_factory<T, F>(&self, name: impl Into<String>, lifetime: Lifetime, factory: F) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register(Provider::factory(name, lifetime, factory))
    }

    /// Registers a factory whose instance is created once per container
    fn register_singleton<T, F>(&self, name: impl Into<String>, factory: F) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register_factory(name, Lifetime::Singleton, factory)
    }

    /// Registers a factory invoked on every resolution
    fn register_transient<T, F>(&self, name: impl Into<String>, factory: F) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register_factory(name, Lifetime::Transient, factory)
    }

    /// Registers a factory whose instance is created once per scope
    fn register_scoped<T, F>(&self, name: impl Into<String>, factory: F) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register_factory(name, Lifetime::Scoped, factory)
    }

    /// Resolves a service and downcasts it to `T`
    fn resolve_as<T>(&self, name: &str) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        downcast(name, self.resolve(name)?)
    }

    /// Resolves a service under `ctx` and downcasts it to `T`
    fn resolve_as_with_context<'a, T>(
        &'a self,
        name: &'a str,
        ctx: &'a Context
    ) -> BoxFuture<'a, Result<Arc<T>, Error>>
    where
        T: Send + Sync + 'static,
    {
        Box::pin(async move {
            let instance = self.resolve_with_context(name, ctx).await?;
            downcast(name, instance)
        })
    }
}

impl<C: Container + ?Sized> ContainerExt for C {}

#[inline]
fn downcast<T: Send + Sync + 'static>(name: &str, instance: Instance) -> Result<Arc<T>, Error> {
    instance
        .downcast::<T>()
        .map_err(|_| Error::TypeMismatch {
            name: name.into(),
            expected: type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Settings {
        url: &'static str,
    }

    #[test]
    fn it_resolves_typed_service() {
        let root = RootContainer::new();
        root.register_value("settings", Settings { url: "postgres://localhost" }).unwrap();

        let settings = root.resolve_as::<Settings>("settings").unwrap();

        assert_eq!(settings.url, "postgres://localhost");
    }

    #[test]
    fn it_fails_on_type_mismatch() {
        let root = RootContainer::new();
        root.register_value("settings", Settings { url: "" }).unwrap();

        let err = root.resolve_as::<String>("settings").unwrap_err();

        assert!(matches!(err, Error::TypeMismatch { name, .. } if name == "settings"));
    }

    #[test]
    fn it_rejects_duplicate_registration() {
        let root = RootContainer::new();
        root.register_value("settings", 1_u8).unwrap();

        let err = root.register_value("settings", 2_u8).unwrap_err();

        assert!(matches!(err, Error::AlreadyRegistered(name) if name == "settings"));
    }

    #[test]
    fn it_registers_all_or_nothing() {
        let services = ServiceMap::default();
        let providers = [
            Provider::value("a", 1),
            Provider::value("b", 2),
            Provider::value("a", 3),
        ];

        assert!(services.insert_all(&providers).is_err());
        assert_eq!(services.len(), 0);
    }

    #[test]
    fn it_caches_singleton_and_not_transient() {
        let counter = Arc::new(AtomicUsize::new(0));
        let root = RootContainer::new();

        let c = counter.clone();
        root.register_singleton("single", move |_| Ok(c.fetch_add(1, Ordering::SeqCst))).unwrap();
        let c = counter.clone();
        root.register_transient("many", move |_| Ok(c.fetch_add(1, Ordering::SeqCst))).unwrap();

        let s1 = root.resolve("single").unwrap();
        let s2 = root.resolve("single").unwrap();
        let t1 = root.resolve("many").unwrap();
        let t2 = root.resolve("many").unwrap();

        assert!(Arc::ptr_eq(&s1, &s2));
        assert!(!Arc::ptr_eq(&t1, &t2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn it_does_not_cache_failed_singleton() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let root = RootContainer::new();

        let a = attempts.clone();
        root.register_singleton("flaky", move |_| {
            if a.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::from("not yet"))
            } else {
                Ok(())
            }
        }).unwrap();

        let err = root.resolve("flaky").unwrap_err();
        assert!(matches!(err, Error::ResolveFailed { name, .. } if name == "flaky"));
        assert!(root.resolve("flaky").is_ok());
    }

    #[tokio::test]
    async fn it_resolves_typed_service_with_context() {
        let root = RootContainer::new();
        root.register(Provider::asynchronous("pool", Lifetime::Singleton, |_| async {
            Ok(Settings { url: "redis://cache" })
        })).unwrap();

        let ctx = Context::new();
        let pool = root.resolve_as_with_context::<Settings>("pool", &ctx).await.unwrap();
        let again = root.resolve_as::<Settings>("pool").unwrap();

        assert!(Arc::ptr_eq(&pool, &again));
    }

    #[test]
    fn it_resolves_dependencies_inside_factory() {
        let root = RootContainer::new();
        root.register_value("url", "postgres://db").unwrap();
        root.register_singleton("settings", |c| {
            let url = c.resolve_as::<&'static str>("url")?;
            Ok(Settings { url: *url })
        }).unwrap();

        let settings = root.resolve_as::<Settings>("settings").unwrap();

        assert_eq!(*settings, Settings { url: "postgres://db" });
    }

    #[test]
    fn it_hands_out_one_singleton_to_racing_threads() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let root = RootContainer::new();

        let c = constructions.clone();
        root.register_singleton("slow", move |_| {
            let id = c.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(id)
        }).unwrap();

        let barrier = std::sync::Barrier::new(8);
        let resolved: Vec<Instance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| {
                    barrier.wait();
                    root.resolve("slow").unwrap()
                }))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let cached = root.resolve("slow").unwrap();
        assert!(constructions.load(Ordering::SeqCst) >= 1);
        assert!(resolved.iter().all(|instance| Arc::ptr_eq(instance, &cached)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn it_hands_out_one_async_singleton_to_racing_tasks() {
        let root = Arc::new(RootContainer::new());
        root.register(Provider::asynchronous("pool", Lifetime::Singleton, |_| async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(Settings { url: "postgres://pool" })
        })).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let root = root.clone();
                tokio::spawn(async move {
                    root.resolve_as_with_context::<Settings>("pool", &Context::new()).await.unwrap()
                })
            })
            .collect();

        let mut resolved = Vec::with_capacity(handles.len());
        for handle in handles {
            resolved.push(handle.await.unwrap());
        }

        let cached = root.resolve_as::<Settings>("pool").unwrap();
        assert!(resolved.iter().all(|settings| Arc::ptr_eq(settings, &cached)));
    }
}
