#![allow(missing_docs)]

use doffy::{
    App, Error, PluginManager,
    di::{Container, EncapsulationMode, Module, Provider, Violation, ViolationSink},
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default, Clone)]
struct Warnings(Arc<Mutex<Vec<Violation>>>);

impl ViolationSink for Warnings {
    fn warn(&self, violation: &Violation) {
        self.0.lock().push(violation.clone());
    }
}

fn parent(global: bool) -> Module {
    let module = Module::new("parent", "1.0.0")
        .with_provider(Provider::value("x", "private"))
        .with_provider(Provider::value("y", "public"))
        .with_exports(["y"]);
    if global { module.as_global() } else { module }
}

fn child(global: bool) -> Module {
    let module = Module::new("child", "1.0.0").with_imports(["parent"]);
    if global { module.as_global() } else { module }
}

async fn app(mode: EncapsulationMode, parent_global: bool, child_global: bool) -> App {
    let mut app = App::new().with_encapsulation(mode);
    app.register_module(parent(parent_global)).unwrap();
    app.register_module(child(child_global)).unwrap();
    app.start().await.unwrap();
    app
}

fn resolve(app: &App, module: &str, name: &str) -> Result<&'static str, doffy::di::Error> {
    let container = app.manager().container(module).unwrap();
    let value = container.resolve(name)?;
    Ok(*value.downcast::<&'static str>().unwrap())
}

#[tokio::test]
async fn it_denies_unexported_access_in_enforce_mode() {
    let app = app(EncapsulationMode::Enforce, false, false).await;

    let err = resolve(&app, "child", "x").unwrap_err();

    assert!(matches!(
        err,
        doffy::di::Error::AccessDenied { from, to, service } if from == "child" && to == "parent" && service == "x"
    ));
}

#[tokio::test]
async fn it_warns_and_allows_in_warn_mode() {
    let app = app(EncapsulationMode::Warn, false, false).await;
    let warnings = Warnings::default();
    app.manager().policy().set_sink(warnings.clone());

    assert_eq!(resolve(&app, "child", "x").unwrap(), "private");

    let warnings = warnings.0.lock();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].from_module, "child");
    assert_eq!(warnings[0].to_module, "parent");
    assert_eq!(warnings[0].service, "x");
}

#[tokio::test]
async fn it_allows_silently_when_disabled() {
    let app = app(EncapsulationMode::Disabled, false, false).await;
    let warnings = Warnings::default();
    app.manager().policy().set_sink(warnings.clone());

    assert_eq!(resolve(&app, "child", "x").unwrap(), "private");
    assert!(warnings.0.lock().is_empty());
}

#[tokio::test]
async fn it_allows_any_mode_when_either_module_is_global() {
    for mode in [EncapsulationMode::Disabled, EncapsulationMode::Warn, EncapsulationMode::Enforce] {
        let parent_global = app(mode, true, false).await;
        let child_global = app(mode, false, true).await;

        assert_eq!(resolve(&parent_global, "child", "x").unwrap(), "private");
        assert_eq!(resolve(&child_global, "child", "x").unwrap(), "private");
    }
}

#[tokio::test]
async fn it_returns_same_exported_instance_as_owner() {
    let app = app(EncapsulationMode::Enforce, false, false).await;
    let parent = app.manager().container("parent").unwrap();
    let child = app.manager().container("child").unwrap();

    let from_parent = parent.resolve("y").unwrap();
    let from_child = child.resolve("y").unwrap();

    assert!(Arc::ptr_eq(&from_parent, &from_child));
}

#[tokio::test]
async fn it_never_shares_providers_between_siblings() {
    for mode in [EncapsulationMode::Disabled, EncapsulationMode::Warn, EncapsulationMode::Enforce] {
        let mut manager = PluginManager::new();
        manager.policy().set_mode(mode);
        manager.register_module(
            Module::new("a", "1.0.0").with_provider(Provider::value("priv", 1_u8))
        ).unwrap();
        manager.register_module(Module::new("b", "1.0.0")).unwrap();
        manager.initialize_all(&Default::default()).await.unwrap();

        let err = manager.container("b").unwrap().resolve("priv").unwrap_err();

        assert!(err.is_not_registered(), "mode {mode}: {err}");
    }
}

#[tokio::test]
async fn it_switches_mode_at_runtime() {
    let mut app = app(EncapsulationMode::Enforce, false, false).await;
    assert!(resolve(&app, "child", "x").is_err());

    app.set_encapsulation_mode(EncapsulationMode::Disabled);

    assert_eq!(app.encapsulation_mode(), EncapsulationMode::Disabled);
    assert!(resolve(&app, "child", "x").is_ok());
}

#[tokio::test]
async fn it_rejects_request_scope_of_unknown_module() {
    let app = app(EncapsulationMode::Enforce, false, false).await;

    assert!(matches!(app.request_scope("ghost"), Err(Error::ModuleNotFound(_))));
}
