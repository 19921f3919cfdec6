//! Providers describe how a named service instance is constructed

use crate::{Container, Context, Lifetime, error::Error};
use futures_util::future::BoxFuture;
use tokio::time::{Instant, sleep_until};

use std::{
    any::Any,
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
    time::Duration,
};

/// Default construction budget of an asynchronous provider
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// A type-erased, shareable service instance
pub type Instance = Arc<
    dyn Any
    + Send
    + Sync
>;

/// Synchronous constructor that may resolve other services from its owning container
pub type FactoryFn = Arc<
    dyn Fn(&dyn Container) -> Result<Instance, Error>
    + Send
    + Sync
>;

/// Zero-argument constructor of a statically known type
pub type ClassFn = Arc<
    dyn Fn() -> Instance
    + Send
    + Sync
>;

/// Constructor that may suspend, e.g. while establishing a network connection
pub type AsyncFactoryFn = Arc<
    dyn Fn(Context) -> BoxFuture<'static, Result<Instance, Error>>
    + Send
    + Sync
>;

/// The closed set of construction strategies
#[derive(Clone)]
pub enum ProviderKind {
    /// Returns a pre-supplied instance
    Value(Instance),
    /// Invokes a constructor with the owning container
    Factory(FactoryFn),
    /// Invokes a zero-argument constructor
    Class(ClassFn),
    /// Invokes a constructor that may suspend, bounded by a timeout
    Async {
        /// Constructor
        factory: AsyncFactoryFn,
        /// Construction budget
        timeout: Duration,
    },
}

/// Describes how to construct a named service instance
///
/// # Example
/// ```no_run
/// use doffy_di::{Lifetime, Provider, RootContainer, Container};
///
/// #[derive(Default)]
/// struct Mailer;
///
/// let root = RootContainer::new();
/// root.register(Provider::value("smtp_host", String::from("localhost"))).unwrap();
/// root.register(Provider::class::<Mailer>("mailer", Lifetime::Singleton)).unwrap();
/// ```
#[derive(Clone)]
pub struct Provider {
    name: String,
    lifetime: Lifetime,
    kind: ProviderKind,
}

impl Debug for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ProviderKind::Value(_) => "value",
            ProviderKind::Factory(_) => "factory",
            ProviderKind::Class(_) => "class",
            ProviderKind::Async { .. } => "async",
        };
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .field("kind", &kind)
            .finish()
    }
}

impl Provider {
    /// Creates a provider that always returns `value`.
    ///
    /// Value providers are always singletons.
    pub fn value<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self::from_instance(name, Arc::new(value))
    }

    /// Creates a provider from an already type-erased instance
    pub fn from_instance(name: impl Into<String>, instance: Instance) -> Self {
        Self {
            name: name.into(),
            lifetime: Lifetime::Singleton,
            kind: ProviderKind::Value(instance),
        }
    }

    /// Creates a provider that invokes `factory` with the owning container
    pub fn factory<T, F>(name: impl Into<String>, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |c: &dyn Container| {
            factory(c).map(|t| Arc::new(t) as Instance)
        });
        Self {
            name: name.into(),
            lifetime,
            kind: ProviderKind::Factory(factory),
        }
    }

    /// Creates a provider that allocates `T::default()`
    pub fn class<T>(name: impl Into<String>, lifetime: Lifetime) -> Self
    where
        T: Default + Send + Sync + 'static,
    {
        Self::class_with(name, lifetime, T::default)
    }

    /// Creates a provider that allocates an instance with a zero-argument constructor
    pub fn class_with<T, F>(name: impl Into<String>, lifetime: Lifetime, ctor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let ctor: ClassFn = Arc::new(move || Arc::new(ctor()) as Instance);
        Self {
            name: name.into(),
            lifetime,
            kind: ProviderKind::Class(ctor),
        }
    }

    /// Creates an asynchronous provider with the default 30 seconds budget.
    ///
    /// The constructor receives a [`Context`] that is cancelled once the budget is spent;
    /// the pending construction is dropped at that point.
    pub fn asynchronous<T, F, Fut>(name: impl Into<String>, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let factory: AsyncFactoryFn = Arc::new(move |ctx: Context| {
            let construction = factory(ctx);
            Box::pin(async move {
                construction.await.map(|t| Arc::new(t) as Instance)
            })
        });
        Self {
            name: name.into(),
            lifetime,
            kind: ProviderKind::Async {
                factory,
                timeout: DEFAULT_ASYNC_TIMEOUT,
            },
        }
    }

    /// Changes the lifetime of this provider. Value providers remain singletons.
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        if !matches!(self.kind, ProviderKind::Value(_)) {
            self.lifetime = lifetime;
        }
        self
    }

    /// Sets the construction budget of an asynchronous provider.
    ///
    /// Has no effect on other provider kinds.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        if let ProviderKind::Async { timeout, .. } = &mut self.kind {
            *timeout = budget;
        }
        self
    }

    /// Returns the service name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service lifetime
    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Returns `true` if construction may suspend
    #[inline]
    pub fn is_async(&self) -> bool {
        matches!(self.kind, ProviderKind::Async { .. })
    }

    /// Returns the construction budget of an asynchronous provider
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        match self.kind {
            ProviderKind::Async { timeout, .. } => Some(timeout),
            _ => None,
        }
    }

    /// Returns the construction strategy
    #[inline]
    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    /// Constructs an instance without suspending.
    ///
    /// Asynchronous providers cannot be constructed this way and return [`Error::AsyncNotReady`].
    pub fn resolve_sync(&self, container: &dyn Container) -> Result<Instance, Error> {
        match &self.kind {
            ProviderKind::Value(instance) => Ok(instance.clone()),
            ProviderKind::Factory(factory) => factory(container),
            ProviderKind::Class(ctor) => Ok(ctor()),
            ProviderKind::Async { .. } => Err(Error::AsyncNotReady(self.name.clone())),
        }
    }

    /// Constructs an instance, awaiting asynchronous constructors.
    ///
    /// The provider does not touch container state, caching is up to the caller.
    pub async fn resolve(&self, container: &dyn Container, ctx: &Context) -> Result<Instance, Error> {
        let ProviderKind::Async { factory, timeout } = &self.kind else {
            return self.resolve_sync(container);
        };

        if ctx.is_cancelled() {
            return Err(Error::Cancelled(self.name.clone()));
        }

        let ctx = ctx.with_timeout(*timeout);
        let budget = ctx.remaining().unwrap_or(*timeout);
        let deadline = ctx.deadline().unwrap_or_else(|| Instant::now() + *timeout);

        // cancels everything the constructor spawned under `ctx` once we return
        let _guard = ctx.cancellation_token().clone().drop_guard();
        let construction = factory(ctx.clone());

        tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => Err(Error::Cancelled(self.name.clone())),
            result = construction => result,
            _ = sleep_until(deadline) => Err(Error::DeadlineExceeded {
                name: self.name.clone(),
                timeout: budget,
            }),
        }
    }
}
