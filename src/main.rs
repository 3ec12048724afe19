use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use dialect_base::auth::AuthService;
use dialect_base::catalog::LanguageCatalog;
use dialect_base::config::AppConfig;
use dialect_base::lookup::LookupChain;
use dialect_base::openapi::ApiDoc;
use dialect_base::password::PasswordHasher;
use dialect_base::quota::QuotaPolicy;
use dialect_base::rate_limit::{InMemoryRateLimiter, RateLimiterFacade};
use dialect_base::security::cors;
use dialect_base::repo::UserRepo;
use dialect_base::{config, AppState, SecurityHeaders};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping dialect-base server");
    info!("Primary dictionary: {}", cfg.wiktionary_base);
    info!("Secondary dictionary: {}", cfg.free_dictionary_base);

    let repo = build_repo(&cfg).await?;
    let catalog = Arc::new(LanguageCatalog::builtin());
    info!("Supported languages: {}", catalog.names().join(", "));
    let lookup = LookupChain::standard(catalog, &cfg.wiktionary_base, &cfg.free_dictionary_base, cfg.lookup_timeout)
        .context("building dictionary HTTP client")?;
    let hasher = PasswordHasher::new().context("configuring password hasher")?;
    let auth = AuthService::new(repo.clone(), hasher, cfg.token_issuer());
    let rate_limiter = cfg
        .rate_limit_enabled
        .then(|| RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg.rate_limits.clone()));

    let state = AppState {
        repo,
        auth: Arc::new(auth),
        lookup: Arc::new(lookup),
        quota: QuotaPolicy::default(),
        rate_limiter,
    };
    let openapi = ApiDoc::openapi();
    let security = SecurityHeaders::default().with_hsts(cfg.enable_hsts);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .wrap(cors())
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.host.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.host, cfg.port);

    server.run().await?;
    Ok(())
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn UserRepo>> {
    use dialect_base::repo::inmem::InMemRepo;
    let repo = match cfg.data_dir.as_deref() {
        Some(dir) => {
            info!("Using in-memory user store persisted under {}", dir.display());
            InMemRepo::with_data_dir(dir)
        }
        None => {
            info!("Using volatile in-memory user store");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn UserRepo>> {
    use dialect_base::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;
    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connecting to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("running migrations")?;
    info!("Using Postgres user store");
    Ok(Arc::new(repo))
}

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable either the `inmem-store` or the `postgres-store` feature");
