//! Module definitions: a named bundle of providers with explicit imports and exports

use crate::provider::Provider;
use std::collections::HashSet;

/// Reasons a [`Module`] definition is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Module has no name
    #[error("Module Error: module name cannot be empty")]
    EmptyName,

    /// Module has no version
    #[error("Module Error: module '{0}' must have a version")]
    EmptyVersion(String),

    /// One of the providers has no name
    #[error("Module Error: module '{0}' has a provider with an empty name")]
    EmptyProviderName(String),

    /// Two providers share a name
    #[error("Module Error: module '{module}' registers provider '{provider}' twice")]
    DuplicateProvider {
        /// Module name
        module: String,
        /// Repeated provider
        provider: String,
    },

    /// An export is listed twice
    #[error("Module Error: module '{module}' exports '{export}' twice")]
    DuplicateExport {
        /// Module name
        module: String,
        /// Repeated export
        export: String,
    },

    /// An export names no provider of the module
    #[error("Module Error: module '{module}' exports '{export}' which is not provided")]
    UnknownExport {
        /// Module name
        module: String,
        /// Export without a provider
        export: String,
    },

    /// Route prefix is malformed
    #[error("Module Error: module '{module}' has invalid prefix '{prefix}': {reason}")]
    InvalidPrefix {
        /// Module name
        module: String,
        /// Declared prefix
        prefix: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// A named bundle of providers.
///
/// Imports are referenced by module name, which keeps definitions free of
/// ownership cycles; the graph resolves them at initialization.
///
/// # Example
/// ```no_run
/// use doffy_di::{Lifetime, Module, Provider};
///
/// #[derive(Default)]
/// struct UserRepository;
///
/// let users = Module::new("users", "1.0.0")
///     .with_imports(["database"])
///     .with_provider(Provider::class::<UserRepository>("user_repository", Lifetime::Singleton))
///     .with_exports(["user_repository"])
///     .with_prefix("/users");
///
/// assert!(users.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    version: String,
    description: String,
    imports: Vec<String>,
    providers: Vec<Provider>,
    exports: Vec<String>,
    prefix: String,
    global: bool,
}

impl Module {
    /// Creates an empty module
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Sets a human-readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds modules this module depends on, by name
    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(imports.into_iter().map(Into::into));
        self
    }

    /// Adds a dependency on `module`
    pub fn importing(mut self, module: &Module) -> Self {
        self.imports.push(module.name.clone());
        self
    }

    /// Adds a provider
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Adds several providers
    pub fn with_providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Adds provider names visible to importing modules
    pub fn with_exports<I, S>(mut self, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports.extend(exports.into_iter().map(Into::into));
        self
    }

    /// Sets the route prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Makes every provider of this module reachable from any container in the application
    pub fn as_global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Module name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Module description
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names of imported modules
    #[inline]
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Providers in declaration order
    #[inline]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Exported provider names
    #[inline]
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Route prefix, empty if none was set
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if the module is global
    #[inline]
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Returns the provider registered under `name`
    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Returns `true` if a provider named `name` is declared
    #[inline]
    pub fn has_provider(&self, name: &str) -> bool {
        self.provider(name).is_some()
    }

    /// Returns `true` if `name` is in the export list
    #[inline]
    pub fn is_exported(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }

    /// Alias of [`Module::is_exported`]
    #[inline]
    pub fn has_export(&self, name: &str) -> bool {
        self.is_exported(name)
    }

    /// Iterates over imported module names
    pub fn import_names(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(String::as_str)
    }

    /// Returns the normalized route prefix: a leading `/` and no trailing `/`.
    ///
    /// An empty prefix stays empty.
    pub fn full_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            if self.prefix.is_empty() { String::new() } else { "/".into() }
        } else {
            format!("/{trimmed}")
        }
    }

    /// Checks the definition.
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// name and version, provider names, duplicate exports, exports that
    /// are not provided, and finally the prefix.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.version.is_empty() {
            return Err(ValidationError::EmptyVersion(self.name.clone()));
        }

        let mut provided = HashSet::with_capacity(self.providers.len());
        for provider in &self.providers {
            if provider.name().is_empty() {
                return Err(ValidationError::EmptyProviderName(self.name.clone()));
            }
            if !provided.insert(provider.name()) {
                return Err(ValidationError::DuplicateProvider {
                    module: self.name.clone(),
                    provider: provider.name().into(),
                });
            }
        }

        let mut exported = HashSet::with_capacity(self.exports.len());
        for export in &self.exports {
            if !exported.insert(export.as_str()) {
                return Err(ValidationError::DuplicateExport {
                    module: self.name.clone(),
                    export: export.clone(),
                });
            }
        }

        if let Some(export) = self.exports.iter().find(|e| !provided.contains(e.as_str())) {
            return Err(ValidationError::UnknownExport {
                module: self.name.clone(),
                export: export.clone(),
            });
        }

        self.validate_prefix()
    }

    fn validate_prefix(&self) -> Result<(), ValidationError> {
        if self.prefix.is_empty() {
            return Ok(());
        }
        let invalid = |reason| ValidationError::InvalidPrefix {
            module: self.name.clone(),
            prefix: self.prefix.clone(),
            reason,
        };
        if !self.prefix.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if self.prefix.contains("..") {
            return Err(invalid("must not contain '..'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lifetime;

    fn users() -> Module {
        Module::new("users", "1.0.0")
            .with_provider(Provider::value("user_repository", ()))
            .with_provider(Provider::class::<u64>("user_counter", Lifetime::Transient))
            .with_exports(["user_repository"])
    }

    #[test]
    fn it_accepts_valid_module() {
        let module = users().with_prefix("/users").with_description("user management");

        assert!(module.validate().is_ok());
        assert_eq!(module.description(), "user management");
        assert!(module.is_exported("user_repository"));
        assert!(!module.is_exported("user_counter"));
    }

    #[test]
    fn it_rejects_empty_name() {
        let module = Module::new("", "");

        assert_eq!(module.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn it_rejects_empty_version() {
        let module = Module::new("users", "");

        assert_eq!(module.validate(), Err(ValidationError::EmptyVersion("users".into())));
    }

    #[test]
    fn it_rejects_empty_provider_name() {
        let module = Module::new("users", "1.0.0").with_provider(Provider::value("", ()));

        assert_eq!(module.validate(), Err(ValidationError::EmptyProviderName("users".into())));
    }

    #[test]
    fn it_rejects_duplicate_provider() {
        let module = users().with_provider(Provider::value("user_repository", 1));

        assert!(matches!(
            module.validate(),
            Err(ValidationError::DuplicateProvider { provider, .. }) if provider == "user_repository"
        ));
    }

    #[test]
    fn it_reports_duplicate_export_before_unknown() {
        let module = users().with_exports(["missing", "user_repository"]);

        assert!(matches!(
            module.validate(),
            Err(ValidationError::DuplicateExport { export, .. }) if export == "user_repository"
        ));
    }

    #[test]
    fn it_rejects_unknown_export() {
        let module = users().with_exports(["missing"]);

        assert!(matches!(
            module.validate(),
            Err(ValidationError::UnknownExport { export, .. }) if export == "missing"
        ));
    }

    #[test]
    fn it_rejects_relative_prefix() {
        let module = users().with_prefix("users");

        assert!(matches!(module.validate(), Err(ValidationError::InvalidPrefix { .. })));
    }

    #[test]
    fn it_rejects_prefix_with_parent_segment() {
        let module = users().with_prefix("/users/../admin");

        assert!(matches!(module.validate(), Err(ValidationError::InvalidPrefix { .. })));
    }

    #[test]
    fn it_normalizes_prefix() {
        assert_eq!(users().full_prefix(), "");
        assert_eq!(users().with_prefix("/").full_prefix(), "/");
        assert_eq!(users().with_prefix("/api/users/").full_prefix(), "/api/users");
    }

    #[test]
    fn it_collects_imports_by_name() {
        let database = Module::new("database", "1.0.0");
        let module = users().importing(&database).with_imports(["cache"]);

        assert_eq!(module.imports(), ["database", "cache"]);
        assert_eq!(module.import_names().collect::<Vec<_>>(), ["database", "cache"]);
    }
}
