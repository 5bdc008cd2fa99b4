use crate::readiness::{SyncState, SyncStatus};
use actix_web::{web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;

const SERVICE: &str = "search-sync-service";

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

async fn readiness_check(status: web::Data<Arc<SyncStatus>>) -> HttpResponse {
    let state = status.state();
    let body = json!({
        "status": if state == SyncState::Consuming { "ready" } else { "not_ready" },
        "state": state.as_str(),
        "service": SERVICE
    });

    match state {
        SyncState::Consuming => HttpResponse::Ok().json(body),
        SyncState::AwaitingIndexReady => HttpResponse::ServiceUnavailable().json(body),
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
    async fn test_ready_reflects_sync_state() {
        let status = Arc::new(SyncStatus::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(status.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);

        status.mark_consuming();
        let req = test::TestRequest::get().uri("/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_health_and_metrics() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(SyncStatus::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get().uri("/metrics").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }
}
