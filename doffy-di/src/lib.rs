//! Named-service dependency injection with module scoping
//!
//! Services are registered as [`Provider`]s under a string name and resolved
//! through a chain of containers: a [`RootContainer`] for the application,
//! a [`ModuleContainer`] per [`Module`] and a [`RequestContainer`] per unit of work.
//! Cross-module access to unexported providers is governed by an [`EncapsulationPolicy`].

pub use crate::{
    container::{Container, ContainerExt, ModuleContainer, RequestContainer, RootContainer},
    context::Context,
    encapsulation::{EncapsulationMode, EncapsulationPolicy, TracingSink, Violation, ViolationSink},
    error::{BoxError, Error},
    lifetime::Lifetime,
    module::{Module, ValidationError},
    provider::{DEFAULT_ASYNC_TIMEOUT, Instance, Provider, ProviderKind},
};

pub mod container;
pub mod context;
pub mod encapsulation;
pub mod error;
pub mod lifetime;
pub mod module;
pub mod provider;
