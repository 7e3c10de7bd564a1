use std::sync::Arc;

use anyhow::Context;
use movieverse::{
    Catalog, QueryFacade,
    config::Config,
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,movieverse=debug".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    tracing::info!(data_dir = %config.data_dir.display(), "loading catalog");

    let source = Arc::new(config.source());
    let options = config.scan_options();
    let catalog = tokio::task::spawn_blocking(move || Catalog::load(source, options))
        .await?
        .context("loading catalog")?;
    let facade = QueryFacade::new(Arc::new(catalog));

    if config.eager_language_index {
        let facade = facade.clone();
        tokio::task::spawn_blocking(move || {
            facade.catalog().snapshot().languages().index();
        });
    }

    if let Some(every) = config.reload_interval {
        let facade = facade.clone();
        let eager = config.eager_language_index;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let facade = facade.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let published = facade.catalog().reload()?;
                    if published && eager {
                        facade.catalog().snapshot().languages().index();
                    }
                    Ok::<_, movieverse::CatalogError>(published)
                })
                .await;
                match result {
                    Ok(Ok(published)) => tracing::info!(published, "scheduled reload finished"),
                    Ok(Err(err)) => tracing::warn!(error = %err, "scheduled reload failed"),
                    Err(err) => tracing::warn!(error = %err, "scheduled reload panicked"),
                }
            }
        });
    }

    let app = routes::router(Arc::new(AppState::new(facade)));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
