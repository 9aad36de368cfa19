use crate::{
    error::EditError,
    handler::EditHandler,
    models::{EditRequest, ErrorBody},
};
use actix_web::{
    error::{InternalError, JsonPayloadError},
    web, HttpRequest, HttpResponse,
};
use serde_json::json;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/generate", web::post().to(generate))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}

/// JSON body limit plus an error handler that keeps the service's error shape.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            let message = match &err {
                JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                    "request body is too large".to_string()
                }
                JsonPayloadError::ContentType => {
                    "request body must be application/json".to_string()
                }
                other => format!("invalid request body: {}", other),
            };
            log::warn!("Rejected request body: {}", err);
            let response = HttpResponse::BadRequest().json(ErrorBody {
                error: message,
                code: "INVALID_REQUEST_BODY".to_string(),
            });
            InternalError::from_response(err, response).into()
        })
}

async fn generate(
    handler: web::Data<EditHandler>,
    body: web::Json<EditRequest>,
) -> Result<HttpResponse, EditError> {
    let response = handler.handle(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn health(handler: web::Data<EditHandler>) -> HttpResponse {
    let sink = handler.sink();
    let healthy = match sink.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            log::warn!("Usage sink health check failed: {}", e);
            false
        }
    };

    let status = if healthy { "ok" } else { "degraded" };

    HttpResponse::Ok().json(json!({
        "status": status,
        "usage_sink": sink.name(),
        "usage_sink_healthy": healthy,
    }))
}

async fn metrics(handler: web::Data<EditHandler>) -> HttpResponse {
    let metrics = handler.metrics();
    match metrics.encode() {
        Ok(body) => HttpResponse::Ok()
            .content_type(metrics.content_type())
            .body(body),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
