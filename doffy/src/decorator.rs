//! Application-level instance, request and reply decorators

use crate::error::Error;
use doffy_di::{Instance, RequestContainer};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// Application-wide instance decorators and the request defaults copied into
/// every new [`RequestContainer`].
///
/// A request that already carries a value under the same name keeps its own.
#[derive(Default)]
pub struct DecoratorRegistry {
    instance: RwLock<IndexMap<String, Instance>>,
    request: RwLock<IndexMap<String, Instance>>,
    reply: RwLock<IndexMap<String, Instance>>,
}

impl Debug for DecoratorRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorRegistry")
            .field("instance", &self.instance_names())
            .field("request", &self.request_names())
            .field("reply", &self.reply_names())
            .finish()
    }
}

impl DecoratorRegistry {
    /// Creates an empty registry
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an application-wide instance decorator
    pub fn decorate<T>(&self, name: impl Into<String>, value: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        insert(&self.instance, name.into(), Arc::new(value))
    }

    /// Returns an instance decorator
    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.instance.read().get(name).cloned()
    }

    /// Returns an instance decorator downcast to `T`
    pub fn instance_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.instance(name).and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns `true` if an instance decorator named `name` is registered
    #[inline]
    pub fn has_instance(&self, name: &str) -> bool {
        self.instance.read().contains_key(name)
    }

    /// Removes an instance decorator, returns `true` if it was registered
    pub fn remove_instance(&self, name: &str) -> bool {
        self.instance.write().shift_remove(name).is_some()
    }

    /// Names of instance decorators in registration order
    pub fn instance_names(&self) -> Vec<String> {
        self.instance.read().keys().cloned().collect()
    }

    /// Returns the number of instance, request and reply decorators
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.instance.read().len(), self.request.read().len(), self.reply.read().len())
    }

    /// Registers a default request value
    pub fn decorate_request<T>(&self, name: impl Into<String>, default: T) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        insert(&self.request, name.into(), Arc::new(default))
    }

    /// Registers a reply helper
    pub fn decorate_reply<F>(&self, name: impl Into<String>, helper: F) -> Result<(), Error>
    where
        F: Send + Sync + 'static,
    {
        insert(&self.reply, name.into(), Arc::new(helper))
    }

    /// Returns `true` if a request default named `name` is registered
    #[inline]
    pub fn has_request(&self, name: &str) -> bool {
        self.request.read().contains_key(name)
    }

    /// Returns `true` if a reply helper named `name` is registered
    #[inline]
    pub fn has_reply(&self, name: &str) -> bool {
        self.reply.read().contains_key(name)
    }

    /// Removes a request default, returns `true` if it was registered
    pub fn remove_request(&self, name: &str) -> bool {
        self.request.write().shift_remove(name).is_some()
    }

    /// Removes a reply helper, returns `true` if it was registered
    pub fn remove_reply(&self, name: &str) -> bool {
        self.reply.write().shift_remove(name).is_some()
    }

    /// Names of request defaults in registration order
    pub fn request_names(&self) -> Vec<String> {
        self.request.read().keys().cloned().collect()
    }

    /// Names of reply helpers in registration order
    pub fn reply_names(&self) -> Vec<String> {
        self.reply.read().keys().cloned().collect()
    }

    /// Copies defaults that `request` does not carry yet
    pub fn apply(&self, request: &RequestContainer) {
        for (name, value) in self.request.read().iter() {
            if !request.has_request_data(name) {
                request.decorate_request_instance(name.clone(), value.clone());
            }
        }
        for (name, helper) in self.reply.read().iter() {
            if !request.has_reply_helper(name) {
                request.decorate_reply_instance(name.clone(), helper.clone());
            }
        }
    }
}

fn insert(map: &RwLock<IndexMap<String, Instance>>, name: String, value: Instance) -> Result<(), Error> {
    let mut map = map.write();
    if map.contains_key(&name) {
        return Err(Error::DecoratorExists(name));
    }
    map.insert(name, value);
    Ok(())
}
