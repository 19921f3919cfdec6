//! Two modules, an asynchronous provider and enforced encapsulation.
//!
//! Run with `RUST_LOG=debug cargo run --example modules`.

use doffy::{
    App, Plugin,
    di::{BoxError, Container, ContainerExt, EncapsulationMode, Lifetime, Module, ModuleContainer, Provider},
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct Pool {
    url: String,
}

struct Users {
    module: Module,
}

impl Plugin for Users {
    fn module(&self) -> &Module {
        &self.module
    }

    fn init(&self, container: &ModuleContainer) -> Result<(), BoxError> {
        let pool = container.resolve_as::<Pool>("pool")?;
        tracing::info!(url = %pool.url, "users module connected");

        if let Err(err) = container.resolve("migrations") {
            tracing::info!("as expected: {err}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), doffy::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut app = App::new().with_encapsulation(EncapsulationMode::Enforce);

    app.register_module(
        Module::new("database", "1.0.0")
            .with_provider(
                Provider::asynchronous("pool", Lifetime::Singleton, |_| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(Pool { url: "postgres://localhost/app".into() })
                })
                .with_timeout(Duration::from_secs(5))
            )
            .with_provider(Provider::value("migrations", vec!["0001_init"]))
            .with_exports(["pool"])
    )?;
    app.register(Users {
        module: Module::new("users", "1.0.0")
            .with_imports(["database"])
            .with_prefix("/users"),
    })?;
    app.on_ready(|| {
        tracing::info!("application is ready");
        Ok::<_, BoxError>(())
    });

    let stop = app.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.cancel();
    });

    app.run().await
}
