#![allow(missing_docs)]

use doffy::{
    App,
    di::{Container, ContainerExt, Lifetime, Module, Provider},
};
use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

#[derive(Debug, Default)]
struct Session {
    id: usize,
}

#[derive(Debug)]
struct UnitOfWork {
    session: Arc<Session>,
}

async fn users_app() -> App {
    let sequence = Arc::new(AtomicUsize::new(0));
    let transient_seq = sequence.clone();

    let mut app = App::new();
    app.register_module(
        Module::new("users", "1.0.0")
            .with_provider(Provider::class::<Session>("singleton_session", Lifetime::Singleton))
            .with_provider(Provider::factory("transient_session", Lifetime::Transient, move |_| {
                Ok(Session { id: transient_seq.fetch_add(1, Ordering::SeqCst) })
            }))
            .with_provider(Provider::factory("unit_of_work", Lifetime::Scoped, |c| {
                Ok(UnitOfWork { session: c.resolve_as::<Session>("singleton_session")? })
            }))
            .with_prefix("/users")
    ).unwrap();
    app.decorate_request("user", String::from("anonymous")).unwrap();
    app.start().await.unwrap();
    app
}

#[tokio::test]
async fn it_returns_identical_singleton_and_distinct_transients() {
    let app = users_app().await;
    let users = app.manager().container("users").unwrap();

    let s1 = users.resolve("singleton_session").unwrap();
    let s2 = users.resolve("singleton_session").unwrap();
    let t1 = users.resolve_as::<Session>("transient_session").unwrap();
    let t2 = users.resolve_as::<Session>("transient_session").unwrap();

    assert!(Arc::ptr_eq(&s1, &s2));
    assert!(!Arc::ptr_eq(&t1, &t2));
    assert_ne!(t1.id, t2.id);
}

#[tokio::test]
async fn it_shares_module_singletons_with_requests() {
    let app = users_app().await;
    let users = app.manager().container("users").unwrap();
    let first = app.request_scope("users").unwrap();
    let second = app.request_scope("users").unwrap();

    let from_module = users.resolve("singleton_session").unwrap();

    assert!(Arc::ptr_eq(&from_module, &first.resolve("singleton_session").unwrap()));
    assert!(Arc::ptr_eq(&from_module, &second.resolve("singleton_session").unwrap()));
}

#[tokio::test]
async fn it_builds_module_scoped_services_per_request() {
    let app = users_app().await;
    let users = app.manager().container("users").unwrap();
    let first = app.request_scope("users").unwrap();
    let second = app.request_scope("users").unwrap();

    let a = first.resolve_as::<UnitOfWork>("unit_of_work").unwrap();
    let b = second.resolve_as::<UnitOfWork>("unit_of_work").unwrap();
    let again = first.resolve_as::<UnitOfWork>("unit_of_work").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &again));
    assert!(Arc::ptr_eq(&a.session, &b.session));
    assert!(Arc::ptr_eq(&a.session, &users.resolve_as::<Session>("singleton_session").unwrap()));
}

#[tokio::test]
async fn it_caches_scoped_services_in_the_module_scope() {
    let app = users_app().await;
    let users = app.manager().container("users").unwrap();

    let from_module = users.resolve("unit_of_work").unwrap();
    let request = app.request_scope("users").unwrap();

    assert!(Arc::ptr_eq(&from_module, &users.resolve("unit_of_work").unwrap()));
    assert!(!Arc::ptr_eq(&from_module, &request.resolve("unit_of_work").unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_isolates_concurrent_request_decorations() {
    let app = Arc::new(users_app().await);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let request = app.request_scope("users").unwrap();
                request.decorate_request("user", format!("user-{i}"));
                tokio::task::yield_now().await;
                let user = request.resolve_as::<String>("user").unwrap();
                (i, user)
            })
        })
        .collect();

    for handle in handles {
        let (i, user) = handle.await.unwrap();
        assert_eq!(*user, format!("user-{i}"));
    }
}

#[tokio::test]
async fn it_applies_app_defaults_to_each_request() {
    let app = users_app().await;
    let request = app.request_scope("users").unwrap();

    assert_eq!(request.resolve_as::<String>("user").unwrap().as_str(), "anonymous");
    assert_eq!(request.request_keys(), ["user"]);
    assert_eq!(app.manager().prefix("users"), Some("/users"));
}

#[tokio::test]
async fn it_drops_request_data_with_the_request() {
    let app = users_app().await;

    {
        let request = app.request_scope("users").unwrap();
        request.decorate_request("user", String::from("alice"));
        assert_eq!(request.resolve_as::<String>("user").unwrap().as_str(), "alice");
    }

    let next = app.request_scope("users").unwrap();
    assert_eq!(next.resolve_as::<String>("user").unwrap().as_str(), "anonymous");
}
