use actix_web::{web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SERVICE: &str = "feature-registry-service";

/// Set while the consumer loop is running.
#[derive(Debug, Default)]
pub struct ConsumerStatus(AtomicBool);

impl ConsumerStatus {
    pub fn set_running(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/metrics", web::get().to(metrics_handler));
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": SERVICE
    }))
}

async fn readiness_check(status: web::Data<Arc<ConsumerStatus>>) -> HttpResponse {
    if status.is_running() {
        HttpResponse::Ok().json(json!({ "status": "ready", "service": SERVICE }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({ "status": "not_ready", "service": SERVICE }))
    }
}

async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return HttpResponse::InternalServerError().body(e.to_string());
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_ready_follows_consumer() {
        let status = Arc::new(ConsumerStatus::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(status.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);

        status.set_running(true);
        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
