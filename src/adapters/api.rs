use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, get, http::header, post, web};
use serde::Serialize;
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::adapters::markers::{MarkerError, MarkerQueryHandler};
use crate::app::services::{PowerStatusHandler, ServiceError};
use crate::domain::power_state::PowerStatus;

#[derive(Clone)]
pub struct ApiState {
    pub power: Arc<dyn PowerStatusHandler>,
    pub markers: Arc<dyn MarkerQueryHandler>,
    pub api_token: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PowerStatusUpdateResponse {
    pub status: &'static str,
    pub power_status: String,
    pub status_changed: bool,
    pub notification_sent: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PowerStatusResponse {
    pub status: String,
    pub last_updated: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkerResponse {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(report_power_status)
        .service(get_power_status)
        .service(list_markers_diagnostics);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/power-status")]
async fn report_power_status(
    request: HttpRequest,
    state: web::Data<ApiState>,
    body: web::Bytes,
) -> HttpResponse {
    if let Err(response) = authorize(&request, &state.api_token) {
        return response;
    }

    let status = match parse_status(&body) {
        Ok(status) => status,
        Err(message) => return bad_request(message),
    };

    let power = Arc::clone(&state.power);
    let report = match web::block(move || power.report_status(status)).await {
        Ok(Ok(report)) => report,
        Ok(Err(error)) => return service_error_response(error),
        Err(error) => {
            tracing::error!(error = %error, "power status worker failed");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "power status worker failed"
            }));
        }
    };

    HttpResponse::Ok().json(PowerStatusUpdateResponse {
        status: "success",
        power_status: status.to_string(),
        status_changed: report.changed,
        notification_sent: report.notified,
    })
}

#[get("/power-status")]
async fn get_power_status(request: HttpRequest, state: web::Data<ApiState>) -> HttpResponse {
    if let Err(response) = authorize(&request, &state.api_token) {
        return response;
    }

    match state.power.current_state() {
        Ok(Some(power)) => HttpResponse::Ok().json(PowerStatusResponse {
            status: power.status.to_string(),
            last_updated: Some(power.raw_observed_at),
        }),
        Ok(None) => HttpResponse::Ok().json(PowerStatusResponse {
            status: "unknown".to_string(),
            last_updated: None,
        }),
        Err(error) => service_error_response(error),
    }
}

#[get("/diagnostics/markers")]
async fn list_markers_diagnostics(
    request: HttpRequest,
    state: web::Data<ApiState>,
) -> HttpResponse {
    if let Err(response) = authorize(&request, &state.api_token) {
        return response;
    }

    match state.markers.list_markers() {
        Ok(markers) => HttpResponse::Ok().json(
            markers
                .into_iter()
                .map(|marker| MarkerResponse {
                    key: marker.key,
                    value: marker.value,
                    updated_at: marker.updated_at,
                })
                .collect::<Vec<_>>(),
        ),
        Err(error) => service_error_response(ServiceError::from(error)),
    }
}

fn authorize(request: &HttpRequest, expected: &str) -> Result<(), HttpResponse> {
    let Some(raw) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Missing Authorization header"
        })));
    };

    let raw = raw.trim();
    let presented = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!(path = %request.path(), "rejected request with invalid API token");
        Err(HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Invalid API token"
        })))
    }
}

fn parse_status(body: &[u8]) -> Result<PowerStatus, &'static str> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|_| "request body must be a JSON object")?;
    let object = payload
        .as_object()
        .ok_or("request body must be a JSON object")?;
    let status = object
        .get("status")
        .ok_or("Missing required field: status")?;

    status
        .as_str()
        .and_then(|value| value.parse().ok())
        .ok_or("Status must be \"on\" or \"off\"")
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    tracing::error!(error = %error, "power status request failed");
    match error {
        ServiceError::LockPoisoned => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "power reconciler lock poisoned"
            }))
        }
        ServiceError::Markers(MarkerError::LockPoisoned) => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "marker store lock poisoned"
            }))
        }
        ServiceError::Markers(error) => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("marker query failed: {error}")
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{App, body::to_bytes, http::StatusCode, test, web};
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Kyiv;
    use serde_json::{Value, json};

    use super::{ApiState, configure_routes};
    use crate::adapters::markers::SqliteMarkerStore;
    use crate::app::power::PowerStatusReconciler;
    use crate::app::services::PowerStatusService;
    use crate::test_support::{FixedClock, RecordingNotifier, open_test_connection};

    const TOKEN: &str = "test-secret";

    fn build_state(name: &str) -> (ApiState, RecordingNotifier) {
        let markers = SqliteMarkerStore::new(Arc::new(Mutex::new(open_test_connection(name))));
        let notifier = RecordingNotifier::default();
        let clock = FixedClock::at(
            Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0)
                .single()
                .expect("valid instant"),
        );
        let service = PowerStatusService::new(
            PowerStatusReconciler::new(notifier.clone(), markers.clone()),
            clock,
            Kyiv,
        );

        (
            ApiState {
                power: Arc::new(service),
                markers: Arc::new(markers),
                api_token: TOKEN.to_string(),
            },
            notifier,
        )
    }

    async fn body_json(resp: actix_web::dev::ServiceResponse) -> Value {
        let bytes = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    #[actix_web::test]
    async fn health_endpoint_returns_ok() {
        let (state, _) = build_state("api-health");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "ok"}));
    }

    #[actix_web::test]
    async fn rejects_missing_and_invalid_tokens() {
        let (state, notifier) = build_state("api-auth");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let missing = test::TestRequest::post()
            .uri("/power-status")
            .set_json(json!({"status": "on"}))
            .to_request();
        let resp = test::call_service(&app, missing).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(resp).await,
            json!({"error": "Missing Authorization header"})
        );

        let wrong = test::TestRequest::post()
            .uri("/power-status")
            .insert_header(("Authorization", "Bearer nope"))
            .set_json(json!({"status": "on"}))
            .to_request();
        let resp = test::call_service(&app, wrong).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await, json!({"error": "Invalid API token"}));

        assert!(notifier.sent().is_empty());
    }

    #[actix_web::test]
    async fn validates_request_body() {
        let (state, _) = build_state("api-validation");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let cases = [
            ("[1,2]", "request body must be a JSON object"),
            (r#"{"state":"on"}"#, "Missing required field: status"),
            (r#"{"status":"maybe"}"#, "Status must be \"on\" or \"off\""),
        ];

        for (body, expected) in cases {
            let req = test::TestRequest::post()
                .uri("/power-status")
                .insert_header(("Authorization", TOKEN))
                .insert_header(("Content-Type", "application/json"))
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({"error": expected}));
        }
    }

    #[actix_web::test]
    async fn reports_transition_then_dedupes_repeat() {
        let (state, notifier) = build_state("api-report");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let post = |status: &str| {
            test::TestRequest::post()
                .uri("/power-status")
                .insert_header(("Authorization", format!("Bearer {TOKEN}")))
                .set_json(json!({ "status": status }))
                .to_request()
        };

        let resp = test::call_service(&app, post("OFF")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({
                "status": "success",
                "power_status": "off",
                "status_changed": true,
                "notification_sent": true
            })
        );

        let resp = test::call_service(&app, post("off")).await;
        assert_eq!(body_json(resp).await["status_changed"], json!(false));
        assert_eq!(notifier.sent().len(), 1);

        let req = test::TestRequest::get()
            .uri("/power-status")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            body_json(resp).await,
            json!({"status": "off", "last_updated": "2026-03-10T08:00:00+02:00"})
        );
    }

    #[actix_web::test]
    async fn current_status_is_unknown_before_first_report() {
        let (state, _) = build_state("api-unknown");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/power-status")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"status": "unknown", "last_updated": null})
        );
    }

    #[actix_web::test]
    async fn lists_markers_for_diagnostics() {
        let (state, _) = build_state("api-markers");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let report = test::TestRequest::post()
            .uri("/power-status")
            .insert_header(("Authorization", TOKEN))
            .set_json(json!({"status": "on"}))
            .to_request();
        test::call_service(&app, report).await;

        let req = test::TestRequest::get()
            .uri("/diagnostics/markers")
            .insert_header(("Authorization", TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        let markers = body.as_array().expect("array body");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0]["key"], json!("power.state"));
        assert!(markers[0]["updatedAt"].is_string());
    }
}
