pub mod routes;

use crate::{config::Config, handler::EditHandler};
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

/// CORS policy for every route. `allowed_origins` is `*` or a comma separated
/// list of origins.
pub fn cors(allowed_origins: &str) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec!["content-type", "authorization", "x-amz-date", "x-api-key"])
        .max_age(86400);

    let origins: Vec<&str> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .collect();
    if origins.is_empty() || origins.contains(&"*") {
        return cors.allow_any_origin().send_wildcard();
    }
    origins
        .into_iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub async fn run(config: Config, handler: EditHandler) -> std::io::Result<()> {
    let data = web::Data::new(handler);
    let origins = config.allowed_origin.clone();
    let body_limit = config.max_request_bytes;
    let address = config.bind_address();

    crate::logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .app_data(data.clone())
            .app_data(routes::json_config(body_limit))
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await
}
