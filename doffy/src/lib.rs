//! # Doffy
//!
//! Assembles an application from modules: named bundles of dependency-injected
//! providers with explicit imports and exports.
//!
//! Modules are registered with an [`App`] (or directly with a [`PluginManager`]),
//! sorted by their imports, their asynchronous providers are constructed in parallel,
//! and their startup steps then run one by one in dependency order.
//!
//! ## Example
//! ```no_run
//! use doffy::{App, di::{EncapsulationMode, Lifetime, Module, Provider}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), doffy::Error> {
//!     let mut app = App::new().with_encapsulation(EncapsulationMode::Enforce);
//!
//!     app.register_module(
//!         Module::new("database", "1.0.0")
//!             .with_provider(Provider::asynchronous("pool", Lifetime::Singleton, |_| async {
//!                 Ok(String::from("postgres://localhost"))
//!             }))
//!             .with_exports(["pool"])
//!     )?;
//!     app.register_module(Module::new("users", "1.0.0").with_imports(["database"]))?;
//!
//!     app.run().await
//! }
//! ```

pub use doffy_di as di;

pub use crate::{
    app::App,
    config::Config,
    decorator::DecoratorRegistry,
    error::Error,
    graph::ModuleGraph,
    hooks::Hooks,
    limits::{DEFAULT_MAX_CONCURRENCY, Limit},
    manager::PluginManager,
    plugin::{ModulePlugin, Plugin, PluginState},
};

pub mod app;
pub mod config;
pub mod decorator;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod limits;
pub mod manager;
pub mod plugin;
