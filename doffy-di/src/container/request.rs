//! Per-request container

use super::{Container, Lookup, Owner, ServiceMap};
use crate::{Lifetime, error::Error, provider::{Instance, Provider}};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// A short-lived container for a single unit of work.
///
/// Request data and reply helpers registered here shadow any provider with the
/// same name and are dropped together with the container.
pub struct RequestContainer {
    services: ServiceMap,
    parent: Arc<dyn Container>,
    request_data: RwLock<HashMap<String, Instance>>,
    reply_helpers: RwLock<HashMap<String, Instance>>,
}

impl Debug for RequestContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContainer")
            .field("parent", &self.parent.scope_name())
            .field("request_data", &self.request_keys())
            .field("reply_helpers", &self.reply_keys())
            .finish()
    }
}

impl RequestContainer {
    /// Creates an empty request container on top of `parent`
    pub fn new(parent: Arc<dyn Container>) -> Self {
        Self {
            services: ServiceMap::default(),
            parent,
            request_data: RwLock::default(),
            reply_helpers: RwLock::default(),
        }
    }

    /// Returns the parent container
    #[inline]
    pub fn parent(&self) -> &Arc<dyn Container> {
        &self.parent
    }

    /// Attaches a request-local value. A later call with the same name replaces it.
    pub fn decorate_request<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        self.decorate_request_instance(name, Arc::new(value));
    }

    /// Attaches an already type-erased request-local value
    pub fn decorate_request_instance(&self, name: impl Into<String>, value: Instance) {
        self.request_data.write().insert(name.into(), value);
    }

    /// Attaches a reply helper function. A later call with the same name replaces it.
    pub fn decorate_reply<F>(&self, name: impl Into<String>, helper: F)
    where
        F: Send + Sync + 'static,
    {
        self.decorate_reply_instance(name, Arc::new(helper));
    }

    /// Attaches an already type-erased reply helper
    pub fn decorate_reply_instance(&self, name: impl Into<String>, helper: Instance) {
        self.reply_helpers.write().insert(name.into(), helper);
    }

    /// Returns a request-local value
    pub fn request_data(&self, name: &str) -> Option<Instance> {
        self.request_data.read().get(name).cloned()
    }

    /// Returns a reply helper downcast to its concrete function type
    pub fn reply_helper<F>(&self, name: &str) -> Option<Arc<F>>
    where
        F: Send + Sync + 'static,
    {
        self.reply_helpers
            .read()
            .get(name)
            .cloned()
            .and_then(|h| h.downcast::<F>().ok())
    }

    /// Returns `true` if a request-local value named `name` is attached
    #[inline]
    pub fn has_request_data(&self, name: &str) -> bool {
        self.request_data.read().contains_key(name)
    }

    /// Returns `true` if a reply helper named `name` is attached
    #[inline]
    pub fn has_reply_helper(&self, name: &str) -> bool {
        self.reply_helpers.read().contains_key(name)
    }

    /// Names of request-local values, sorted
    pub fn request_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.request_data.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Names of reply helpers, sorted
    pub fn reply_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.reply_helpers.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of request-local values and reply helpers
    pub fn len(&self) -> (usize, usize) {
        (self.request_data.read().len(), self.reply_helpers.read().len())
    }

    /// Returns `true` if nothing is attached to this request
    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0)
    }

    /// Drops every request-local value and reply helper
    pub fn clear(&self) {
        self.request_data.write().clear();
        self.reply_helpers.write().clear();
    }

    fn decorated(&self, name: &str) -> Option<Instance> {
        self.request_data(name)
            .or_else(|| self.reply_helpers.read().get(name).cloned())
    }
}

impl Container for RequestContainer {
    #[inline]
    fn scope_name(&self) -> String {
        "request container".into()
    }

    #[inline]
    fn register(&self, provider: Provider) -> Result<(), Error> {
        self.services.insert(provider)
    }

    fn has(&self, name: &str) -> bool {
        self.has_request_data(name)
            || self.has_reply_helper(name)
            || self.services.contains(name)
            || self.parent.has(name)
    }

    fn lookup(&self, name: &str) -> Result<Option<Lookup<'_>>, Error> {
        if let Some(instance) = self.decorated(name) {
            return Ok(Some(Lookup::Ready(instance)));
        }

        if let Some(service) = self.services.get(name) {
            // the request is the scope, so scoped providers behave as transient here
            let cache = service.provider().lifetime() == Lifetime::Singleton;
            return Ok(Some(Lookup::Construct {
                service,
                owner: Owner::Borrowed(self),
                cache,
            }));
        }

        match self.parent.lookup(name)? {
            // scoped services found up the chain are built per call, in their owner's namespace
            Some(Lookup::Construct { service, owner, .. })
                if service.provider().lifetime() == Lifetime::Scoped => {
                Ok(Some(Lookup::Construct { service, owner, cache: false }))
            }
            found => Ok(found),
        }
    }
}
