#[macro_use]
extern crate diesel;

use actix_web::{middleware, web, App, HttpServer};

mod cache;
mod config;
mod error;
mod forms;
mod handlers;
mod migrations;
mod models;
mod repository;
mod schema;
mod service;
mod store;
#[cfg(test)]
mod test_support;

use crate::cache::MenuCache;
use crate::config::Config;
use crate::error::AppError;
use crate::store::Store;

fn to_io_error(err: AppError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(to_io_error)?;

    // set up database connection pool and bring the schema up to date
    let pool = store::build_pool(&config.database_url, config.db_pool_size).map_err(to_io_error)?;
    {
        let conn = pool.get().map_err(|e| to_io_error(e.into()))?;
        let version = migrations::run_migrations(&conn).map_err(|e| to_io_error(e.into()))?;
        log::info!("database {} at schema v{}", config.database_url, version);
    }
    let store = Store::new(pool);

    let cache = match &config.redis_url {
        Some(url) => match MenuCache::connect(url) {
            Ok(cache) => cache,
            Err(e) => {
                log::warn!("menu cache disabled, bad REDIS_URL: {}", e);
                MenuCache::disabled()
            }
        },
        None => MenuCache::disabled(),
    };

    log::info!(
        "starting HTTP server at http://{}:{}",
        config.bind_addr,
        config.port
    );

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(cache.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
