use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use happymeter::analytics::AnalyticsCache;
use happymeter::clients::MessagingClient;
use happymeter::config::Config;
use happymeter::database::Database;
use happymeter::handlers;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let bind_address = config.bind_address();

    let db = Database::connect(&config.database_url).await.map_err(|err| {
        log::error!("Failed to initialize database: {err:?}");
        std::io::Error::new(std::io::ErrorKind::Other, err)
    })?;

    let db_data = web::Data::new(db);
    let messaging = web::Data::new(MessagingClient::new(config.messaging.clone()));
    let analytics_cache = web::Data::new(AnalyticsCache::new(Duration::from_secs(
        config.analytics_cache_ttl_secs,
    )));
    if config.cron_secret.is_none() {
        log::warn!("CRON_SECRET is not set, cron endpoints will reject every call");
    }
    let config_data = web::Data::new(config);

    log::info!("🚀 Starting HappyMeter service on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(messaging.clone())
            .app_data(analytics_cache.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)?
    .run()
    .await
}
