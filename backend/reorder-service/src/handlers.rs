use crate::models::ReorderRequest;
use crate::service::ReorderService;
use actix_web::{web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;

const SERVICE: &str = "reorder-service";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/reorder", web::post().to(reorder))
        .route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Malformed bodies are rejected with 400 by the JSON extractor; everything
/// else answers 200, degraded or not.
async fn reorder(
    service: web::Data<Arc<ReorderService>>,
    request: web::Json<ReorderRequest>,
) -> HttpResponse {
    let response = service.reorder(&request).await;
    HttpResponse::Ok().json(response)
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": SERVICE
    }))
}

async fn readiness_check(service: web::Data<Arc<ReorderService>>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ready",
        "service": SERVICE,
        "model_name": service.model_name()
    }))
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
    use crate::models::ReorderResponse;
    use actix_web::{test, App};
    use catalog_store::InMemoryCatalogStore;
    use feature_cache::InMemoryFeatureCache;

    fn service() -> web::Data<Arc<ReorderService>> {
        web::Data::new(Arc::new(ReorderService::new(
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryFeatureCache::new()),
            None,
        )))
    }

    #[actix_web::test]
    async fn test_reorder_without_model_returns_input_order() {
        let app = test::init_service(App::new().app_data(service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/reorder")
            .set_json(json!({"candidate_ids": ["x", "y", "z"], "query_phrases": []}))
            .to_request();
        let resp: ReorderResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.ordered_ids, vec!["x", "y", "z"]);
        assert_eq!(resp.model_name, None);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test::init_service(App::new().app_data(service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/reorder")
            .insert_header(("content-type", "application/json"))
            .set_payload(r#"{"candidate_ids": "not-a-list"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_metrics_exposes_reorder_counters() {
        let app = test::init_service(App::new().app_data(service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/reorder")
            .set_json(json!({"candidate_ids": ["a"]}))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("reorder_requests_total"));
    }
}
