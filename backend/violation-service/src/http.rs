use actix_web::{web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SERVICE: &str = "violation-service";

/// Ready once the violation type resolved and both consumers are running.
#[derive(Debug, Default)]
pub struct WorkerStatus {
    detection: AtomicBool,
    registration: AtomicBool,
}

impl WorkerStatus {
    pub fn set_detection(&self, running: bool) {
        self.detection.store(running, Ordering::Release);
    }

    pub fn set_registration(&self, running: bool) {
        self.registration.store(running, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.detection.load(Ordering::Acquire) && self.registration.load(Ordering::Acquire)
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

async fn readiness_check(status: web::Data<Arc<WorkerStatus>>) -> HttpResponse {
    if status.is_ready() {
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
    async fn test_ready_needs_both_consumers() {
        let status = Arc::new(WorkerStatus::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(status.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);

        status.set_detection(true);
        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);

        status.set_registration(true);
        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    #[actix_web::test]
    async fn test_health_and_metrics() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(WorkerStatus::default())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
        let req = test::TestRequest::get().uri("/metrics").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }
}
