//! Application-wide container

use super::{Container, Lookup, ModuleContainer, Owner, ServiceMap};
use crate::{Lifetime, error::Error, provider::Provider};
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Weak},
};

/// The top of every container chain.
///
/// Holds application-wide providers and weak references to the containers of
/// global modules, whose providers become visible to every container.
#[derive(Default)]
pub struct RootContainer {
    services: ServiceMap,
    parent: Option<Arc<dyn Container>>,
    globals: RwLock<Vec<Weak<ModuleContainer>>>,
}

impl Debug for RootContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContainer")
            .field("services", &self.services.len())
            .field("scoped", &self.parent.is_some())
            .finish()
    }
}

impl RootContainer {
    /// Creates an empty root container
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child container that falls back to this one.
    ///
    /// The child owns its own registrations and caches; it shares nothing
    /// with this container except the parent link.
    pub fn create_scope(self: &Arc<Self>) -> Arc<RootContainer> {
        Arc::new(Self {
            services: ServiceMap::default(),
            parent: Some(self.clone()),
            globals: RwLock::default(),
        })
    }

    /// Makes the providers of a global module container visible from this container
    pub fn add_global(&self, container: &Arc<ModuleContainer>) {
        let mut globals = self.globals.write();
        globals.retain(|g| g.strong_count() > 0);
        globals.push(Arc::downgrade(container));
    }

    /// Returns the number of providers registered directly in this container
    #[inline]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no providers are registered directly in this container
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_globals(&self) -> Vec<Arc<ModuleContainer>> {
        self.globals
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl Container for RootContainer {
    #[inline]
    fn scope_name(&self) -> String {
        "root container".into()
    }

    #[inline]
    fn register(&self, provider: Provider) -> Result<(), Error> {
        self.services.insert(provider)
    }

    fn has(&self, name: &str) -> bool {
        self.services.contains(name)
            || self.parent.as_ref().is_some_and(|p| p.has(name))
            || self.live_globals().iter().any(|g| g.has_local(name))
    }

    fn lookup(&self, name: &str) -> Result<Option<Lookup<'_>>, Error> {
        if let Some(service) = self.services.get(name) {
            let cache = service.provider().lifetime() != Lifetime::Transient;
            return Ok(Some(Lookup::Construct {
                service,
                owner: Owner::Borrowed(self),
                cache,
            }));
        }

        if let Some(parent) = &self.parent
            && let Some(found) = parent.lookup(name)? {
            return Ok(Some(found));
        }

        for global in self.live_globals() {
            if let Some(found) = ModuleContainer::lookup_shared(&global, name) {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }
}
