use actix_web::middleware::{NormalizePath, from_fn};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};

use attendance::config::Config;
use attendance::cors::cors_middleware;
use attendance::db::{init_db, run_migrations};
use attendance::docs::ApiDoc;
use attendance::routes::{self, Limiters};
use attendance::utils::{enrollment_filter, student_cache};

use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
        info!("Migrations applied");
    }

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) =
            enrollment_filter::warmup_enrollment_filter(&pool_for_filter_warmup, 500).await
        {
            error!(error = %e, "Failed to warm up enrollment filter");
        }
    });

    actix_web::rt::spawn(async move {
        if let Err(e) = student_cache::warmup_inactive_students(&pool_for_cache_warmup, 500).await
        {
            error!(error = %e, "Failed to warm up inactive student cache");
        }
    });

    let limiters = Limiters::from_config(&config)?;
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let config_for_routes = config.clone();
        let limiters = limiters.clone();

        App::new()
            .wrap(from_fn(cors_middleware))
            .wrap(NormalizePath::trim())
            .wrap(actix_web::middleware::Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .configure(move |cfg| routes::configure(cfg, &config_for_routes, &limiters))
            .default_service(web::to(routes::not_found))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
