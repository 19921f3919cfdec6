//! Module dependency graph

use crate::error::Error;
use doffy_di::Module;
use indexmap::IndexMap;
use std::{collections::HashMap, sync::Arc};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Registered modules and their import edges.
///
/// Registration order is preserved and drives the traversal order of
/// [`ModuleGraph::topological_sort`], so the result is deterministic.
#[derive(Debug, Default, Clone)]
pub struct ModuleGraph {
    modules: IndexMap<String, Arc<Module>>,
    edges: IndexMap<String, Vec<String>>,
}

impl ModuleGraph {
    /// Creates an empty graph
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and adds a module.
    ///
    /// Imports may name modules that are registered later; missing
    /// imports are reported by [`ModuleGraph::validate_graph`].
    pub fn add_module(&mut self, module: impl Into<Arc<Module>>) -> Result<(), Error> {
        let module = module.into();
        module.validate().map_err(doffy_di::Error::from)?;

        if self.modules.contains_key(module.name()) {
            return Err(Error::ModuleAlreadyRegistered(module.name().into()));
        }

        let name = module.name().to_owned();
        self.edges.insert(name.clone(), module.imports().to_vec());
        self.modules.insert(name, module);
        Ok(())
    }

    /// Returns a module by name
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.get(name)
    }

    /// Returns `true` if a module with this name is registered
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Iterates over modules in registration order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    /// Returns the number of registered modules
    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no modules are registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns module names sorted alphabetically
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Orders modules so that every module comes after all modules it imports.
    ///
    /// Fails on the first missing import or import cycle.
    pub fn topological_sort(&self) -> Result<Vec<Arc<Module>>, Error> {
        let mut marks = HashMap::with_capacity(self.modules.len());
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.modules.len());

        for name in self.modules.keys() {
            self.visit(name, &mut marks, &mut stack, &mut order)?;
        }

        Ok(order)
    }

    fn visit<'g>(
        &'g self,
        name: &'g str,
        marks: &mut HashMap<&'g str, Mark>,
        stack: &mut Vec<&'g str>,
        order: &mut Vec<Arc<Module>>
    ) -> Result<(), Error> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or_default();
                let path = stack[start..]
                    .iter()
                    .chain(std::iter::once(&name))
                    .map(|n| n.to_string())
                    .collect();
                return Err(Error::CircularDependency {
                    module: name.into(),
                    path,
                });
            }
            None => {}
        }

        marks.insert(name, Mark::InProgress);
        stack.push(name);

        for dependency in self.edges.get(name).into_iter().flatten() {
            if !self.modules.contains_key(dependency) {
                return Err(Error::MissingDependency {
                    module: name.into(),
                    dependency: dependency.clone(),
                });
            }
            self.visit(dependency, marks, stack, order)?;
        }

        stack.pop();
        marks.insert(name, Mark::Done);
        if let Some(module) = self.modules.get(name) {
            order.push(module.clone());
        }
        Ok(())
    }

    /// Checks that every import exists and that imports are acyclic
    pub fn validate_graph(&self) -> Result<(), Error> {
        for (name, dependencies) in &self.edges {
            if let Some(dependency) = dependencies.iter().find(|d| !self.modules.contains_key(*d)) {
                return Err(Error::MissingDependency {
                    module: name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        self.topological_sort().map(|_| ())
    }

    /// Returns the modules directly imported by `name`
    pub fn dependencies(&self, name: &str) -> Result<Vec<Arc<Module>>, Error> {
        let module = self.get(name).ok_or_else(|| Error::ModuleNotFound(name.into()))?;
        module
            .import_names()
            .map(|dependency| {
                self.get(dependency)
                    .cloned()
                    .ok_or_else(|| Error::MissingDependency {
                        module: name.into(),
                        dependency: dependency.into(),
                    })
            })
            .collect()
    }

    /// Returns the modules that directly import `name`
    pub fn dependents(&self, name: &str) -> Result<Vec<Arc<Module>>, Error> {
        if !self.contains(name) {
            return Err(Error::ModuleNotFound(name.into()));
        }
        let dependents = self.edges
            .iter()
            .filter(|(_, dependencies)| dependencies.iter().any(|d| d == name))
            .filter_map(|(dependent, _)| self.get(dependent).cloned())
            .collect();
        Ok(dependents)
    }

    /// Checks that every import of `module` is already registered
    pub fn validate_imports(&self, module: &Module) -> Result<(), Error> {
        match module.import_names().find(|i| !self.contains(i)) {
            Some(missing) => Err(Error::MissingDependency {
                module: module.name().into(),
                dependency: missing.into(),
            }),
            None => Ok(()),
        }
    }

    /// Checks that some import of `module` exports `provider` or is global.
    ///
    /// Static counterpart of the check performed by module containers at resolution time.
    pub fn validate_export_access(&self, module: &Module, provider: &str) -> Result<(), Error> {
        let visible = module
            .import_names()
            .filter_map(|i| self.get(i))
            .any(|imported| imported.is_global() || imported.is_exported(provider));

        if visible {
            Ok(())
        } else {
            Err(Error::ExportNotVisible {
                module: module.name().into(),
                provider: provider.into(),
            })
        }
    }
}
