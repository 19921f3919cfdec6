//! Per-module container with encapsulation checks

use super::{Container, Lookup, Owner, RequestContainer, ServiceMap};
use crate::{
    EncapsulationPolicy,
    Lifetime,
    Module,
    error::Error,
    provider::{Instance, Provider},
};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// A container scoped to a single [`Module`].
///
/// Resolution order is: the module's own providers, then instance decorators
/// of this module and its parent modules, then the providers of imported
/// modules, then the parent chain. Reaching into another module for a provider it
/// does not export is checked against the shared [`EncapsulationPolicy`], unless
/// either module is global.
pub struct ModuleContainer {
    module: Arc<Module>,
    services: ServiceMap,
    parent: Arc<dyn Container>,
    imports: RwLock<Vec<Arc<ModuleContainer>>>,
    decorators: RwLock<HashMap<String, Instance>>,
    policy: Arc<EncapsulationPolicy>,
}

impl Debug for ModuleContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("module", &self.module.name())
            .field("services", &self.services.len())
            .field("imports", &self.imports.read().iter().map(|i| i.name().to_owned()).collect::<Vec<_>>())
            .field("decorators", &self.decorator_names())
            .finish()
    }
}

impl ModuleContainer {
    /// Validates `module` and creates a container holding all of its providers.
    ///
    /// Nothing is registered if validation fails.
    pub fn from_module(
        module: impl Into<Arc<Module>>,
        parent: Arc<dyn Container>,
        policy: Arc<EncapsulationPolicy>
    ) -> Result<Arc<Self>, Error> {
        let module = module.into();
        module.validate()?;

        let services = ServiceMap::default();
        services.insert_all(module.providers())?;

        Ok(Arc::new(Self {
            module,
            services,
            parent,
            imports: RwLock::default(),
            decorators: RwLock::default(),
            policy,
        }))
    }

    /// Returns the module definition
    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Returns the module name
    #[inline]
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Returns the parent container
    #[inline]
    pub fn parent(&self) -> &Arc<dyn Container> {
        &self.parent
    }

    /// Returns the encapsulation policy consulted by this container
    #[inline]
    pub fn policy(&self) -> &Arc<EncapsulationPolicy> {
        &self.policy
    }

    /// Makes the providers of an imported module reachable from this container
    pub fn add_import(&self, import: Arc<ModuleContainer>) {
        let mut imports = self.imports.write();
        if !imports.iter().any(|i| Arc::ptr_eq(i, &import)) {
            imports.push(import);
        }
    }

    /// Returns the containers of imported modules
    pub fn imports(&self) -> Vec<Arc<ModuleContainer>> {
        self.imports.read().clone()
    }

    /// Attaches a ready-made instance under `name`.
    ///
    /// Decorators are visible to this module, to modules whose container has this
    /// one as parent, and to their requests. A name may be attached once and must
    /// not shadow a provider of this module.
    pub fn decorate<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) -> Result<(), Error> {
        self.decorate_instance(name, Arc::new(value))
    }

    /// Attaches an already type-erased instance decorator
    pub fn decorate_instance(&self, name: impl Into<String>, value: Instance) -> Result<(), Error> {
        let name = name.into();
        if self.has_local(&name) {
            return Err(Error::AlreadyRegistered(name));
        }
        let mut decorators = self.decorators.write();
        if decorators.contains_key(&name) {
            return Err(Error::DecoratorExists(name));
        }
        decorators.insert(name, value);
        Ok(())
    }

    /// Returns the decorator named `name`, falling back to parent modules
    pub fn decorator(&self, name: &str) -> Option<Instance> {
        if let Some(value) = self.decorators.read().get(name) {
            return Some(value.clone());
        }
        self.parent.as_module()?.decorator(name)
    }

    /// Returns `true` if this module or a parent module carries the decorator
    #[inline]
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorator(name).is_some()
    }

    /// Detaches a decorator of this module, returns `true` if it was attached
    pub fn remove_decorator(&self, name: &str) -> bool {
        self.decorators.write().remove(name).is_some()
    }

    /// Names of decorators attached to this module, sorted
    pub fn decorator_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.decorators.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Creates a container for a single unit of work
    pub fn create_request_scope(self: &Arc<Self>) -> RequestContainer {
        RequestContainer::new(self.clone())
    }

    /// Checks whether this module may resolve `service` owned by `target`
    pub fn check_access(&self, target: &ModuleContainer, service: &str) -> Result<(), Error> {
        if self.module.is_global() || target.module.is_global() || target.module.is_exported(service) {
            return Ok(());
        }
        self.policy.check_violation(self.name(), target.name(), service)
    }

    #[inline]
    pub(crate) fn has_local(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Looks up a provider of this module only, handing out shared ownership
    pub(crate) fn lookup_shared(this: &Arc<Self>, name: &str) -> Option<Lookup<'static>> {
        let service = this.services.get(name)?;
        let cache = service.provider().lifetime() != Lifetime::Transient;
        Some(Lookup::Construct {
            service,
            owner: Owner::Shared(this.clone()),
            cache,
        })
    }
}

impl Container for ModuleContainer {
    #[inline]
    fn scope_name(&self) -> String {
        format!("module '{}'", self.module.name())
    }

    #[inline]
    fn register(&self, provider: Provider) -> Result<(), Error> {
        self.services.insert(provider)
    }

    fn has(&self, name: &str) -> bool {
        self.has_local(name)
            || self.has_decorator(name)
            || self.imports.read().iter().any(|i| i.has_local(name))
            || self.parent.has(name)
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

        if let Some(value) = self.decorator(name) {
            return Ok(Some(Lookup::Ready(value)));
        }

        let owner = self
            .imports
            .read()
            .iter()
            .find(|i| i.has_local(name))
            .cloned();
        if let Some(import) = owner {
            self.check_access(&import, name)?;
            return Ok(Self::lookup_shared(&import, name));
        }

        if let Some(parent) = self.parent.as_module()
            && parent.has(name) {
            self.check_access(parent, name)?;
        }

        self.parent.lookup(name)
    }

    #[inline]
    fn as_module(&self) -> Option<&ModuleContainer> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerExt, EncapsulationMode, RootContainer};

    fn container(module: Module, parent: Arc<dyn Container>, policy: &Arc<EncapsulationPolicy>) -> Arc<ModuleContainer> {
        ModuleContainer::from_module(module, parent, policy.clone()).unwrap()
    }

    fn users() -> Module {
        Module::new("users", "1.0.0")
            .with_provider(Provider::value("user_repository", "users"))
            .with_provider(Provider::value("password_hasher", "bcrypt"))
            .with_exports(["user_repository"])
    }

    #[test]
    fn it_does_not_register_invalid_module() {
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let module = users().with_exports(["missing"]);

        let err = ModuleContainer::from_module(module, root, Default::default()).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn it_resolves_exported_service_of_import() {
        let policy = Arc::new(EncapsulationPolicy::new(EncapsulationMode::Enforce));
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root.clone(), &policy);
        let orders = container(Module::new("orders", "1.0.0").importing(users.module()), root, &policy);
        orders.add_import(users.clone());

        let from_orders = orders.resolve("user_repository").unwrap();
        let from_users = users.resolve("user_repository").unwrap();

        assert!(Arc::ptr_eq(&from_orders, &from_users));
    }

    #[test]
    fn it_denies_unexported_service_of_import() {
        let policy = Arc::new(EncapsulationPolicy::new(EncapsulationMode::Enforce));
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root.clone(), &policy);
        let orders = container(Module::new("orders", "1.0.0"), root, &policy);
        orders.add_import(users);

        let err = orders.resolve("password_hasher").unwrap_err();

        assert!(err.is_access_denied());
        assert!(orders.has("password_hasher"));
    }

    #[test]
    fn it_checks_exports_of_parent_module() {
        let policy = Arc::new(EncapsulationPolicy::new(EncapsulationMode::Enforce));
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root, &policy);
        let admin = container(Module::new("admin", "1.0.0"), users.clone(), &policy);

        assert!(admin.resolve("user_repository").is_ok());
        assert!(admin.resolve("password_hasher").unwrap_err().is_access_denied());

        policy.set_mode(EncapsulationMode::Disabled);

        assert!(admin.resolve("password_hasher").is_ok());
    }

    #[test]
    fn it_skips_checks_for_global_modules() {
        let policy = Arc::new(EncapsulationPolicy::new(EncapsulationMode::Enforce));
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users().as_global(), root.clone(), &policy);
        let orders = container(Module::new("orders", "1.0.0"), root, &policy);
        orders.add_import(users);

        assert!(orders.resolve("password_hasher").is_ok());
    }

    #[test]
    fn it_reports_originating_module_when_not_registered() {
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let orders = container(Module::new("orders", "1.0.0"), root, &Default::default());

        let err = orders.resolve("missing").unwrap_err();

        assert!(matches!(err, Error::NotRegistered { scope, .. } if scope == "module 'orders'"));
    }

    #[test]
    fn it_caches_scoped_per_module() {
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let module = Module::new("orders", "1.0.0")
            .with_provider(Provider::class::<Vec<u8>>("buffer", Lifetime::Scoped));
        let orders = container(module, root, &Default::default());

        let first = orders.resolve("buffer").unwrap();
        let second = orders.resolve("buffer").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn it_falls_back_to_root_services() {
        let root = Arc::new(RootContainer::new());
        root.register_value("clock", 1_u64).unwrap();
        let orders = container(Module::new("orders", "1.0.0"), root, &Default::default());

        assert_eq!(*orders.resolve_as::<u64>("clock").unwrap(), 1);
    }

    #[test]
    fn it_inherits_decorators_from_parent_module() {
        let policy = Arc::new(EncapsulationPolicy::new(EncapsulationMode::Enforce));
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root, &policy);
        let admin = container(Module::new("admin", "1.0.0"), users.clone(), &policy);

        users.decorate("audit_tag", "users").unwrap();

        assert_eq!(*admin.resolve_as::<&str>("audit_tag").unwrap(), "users");
        assert_eq!(*admin.create_request_scope().resolve_as::<&str>("audit_tag").unwrap(), "users");
        assert!(admin.has_decorator("audit_tag"));
        assert!(admin.decorator_names().is_empty());
    }

    #[test]
    fn it_rejects_duplicate_or_shadowing_decorators() {
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root, &Default::default());

        users.decorate("audit_tag", "first").unwrap();
        let duplicate = users.decorate("audit_tag", "second").unwrap_err();
        let shadowing = users.decorate("user_repository", "fake").unwrap_err();

        assert!(matches!(duplicate, Error::DecoratorExists(name) if name == "audit_tag"));
        assert!(matches!(shadowing, Error::AlreadyRegistered(name) if name == "user_repository"));
        assert_eq!(*users.resolve_as::<&str>("audit_tag").unwrap(), "first");
    }

    #[test]
    fn it_removes_decorators() {
        let root: Arc<dyn Container> = Arc::new(RootContainer::new());
        let users = container(users(), root, &Default::default());
        users.decorate("audit_tag", "users").unwrap();

        assert!(users.remove_decorator("audit_tag"));
        assert!(!users.remove_decorator("audit_tag"));
        assert!(users.resolve("audit_tag").unwrap_err().is_not_registered());
    }
}
