use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use boardhub::openapi::ApiDoc;
use boardhub::repo::Repo;
use boardhub::stats::RollupScheduler;
use boardhub::storage::build_image_store;
use boardhub::{config, AppConfig, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env()?;
    info!("Bootstrapping boardhub");
    info!("Frontend URL: {}", cfg.frontend_url.as_deref().unwrap_or("(none)"));

    let repo = build_repo(&cfg).await?;
    let image_store = build_image_store(&cfg.s3).await?;
    let openapi = ApiDoc::openapi();

    let _rollups = RollupScheduler::new(repo.clone(), cfg.stats_timezone).spawn()?;

    let state = AppState { repo, image_store };
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // local dev frontends
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&cfg.bind_addr)
    .with_context(|| format!("binding {}", cfg.bind_addr))?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn connect_postgres(cfg: &AppConfig, url: &str) -> anyhow::Result<Arc<dyn Repo>> {
    use sqlx::postgres::PgPoolOptions;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(url)
        .await
        .context("connecting to DATABASE_URL")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(boardhub::repo::pg::PgRepo::new(pool)))
}

#[cfg(feature = "inmem-store")]
fn in_memory(cfg: &AppConfig) -> Arc<dyn Repo> {
    use boardhub::repo::inmem::InMemRepo;

    match &cfg.data_dir {
        Some(dir) => {
            let path = std::path::Path::new(dir).join("state.json");
            info!("Using in-memory repository backend (snapshot {})", path.display());
            Arc::new(InMemRepo::with_snapshot(path))
        }
        None => {
            info!("Using in-memory repository backend (ephemeral)");
            Arc::new(InMemRepo::new())
        }
    }
}

async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    match cfg.database_url.as_deref() {
        #[cfg(feature = "postgres-store")]
        Some(url) => connect_postgres(cfg, url).await,
        #[cfg(not(feature = "postgres-store"))]
        Some(_) => anyhow::bail!("DATABASE_URL is set but the postgres-store feature is disabled"),
        #[cfg(feature = "inmem-store")]
        None => Ok(in_memory(cfg)),
        #[cfg(not(feature = "inmem-store"))]
        None => anyhow::bail!("DATABASE_URL must be set"),
    }
}
