use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, chat, jobs, rooms, updates, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(chat::router())
                .merge(rooms::router())
                .merge(updates::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Serves the API with the presence sweeper running alongside, until
/// ctrl-c.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = jobs::spawn_presence_sweeper(
        state.db.clone(),
        state.config.proximity.activity_window_secs,
        state.config.proximity.sweep_interval_secs,
        shutdown_rx,
    );

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed");
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        handle.await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn health_is_public() {
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        for (method, uri) in [
            ("GET", "/api/perfil"),
            ("GET", "/api/general"),
            ("GET", "/api/privado"),
            ("GET", "/api/updates"),
            ("POST", "/api/logout"),
            ("POST", "/api/privado/salir/7a0c2f4e-1d6b-4f43-9b5e-2f3c1a9d8e11"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = call(req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");

            let json: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["success"], false);
            assert!(json["data"].is_null());
            assert!(json["error"].is_string());
            assert!(json["metadata"]["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let req = Request::get("/api/home")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_reports_missing_field_in_envelope() {
        let req = Request::post("/api/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"usuario1@test.com"}"#))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "El campo password es requerido");
    }

    #[tokio::test]
    async fn register_takes_coordinates_as_strings() {
        let req = Request::post("/api/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"email":"usuario1@test.com","username":"usuario1","latitude":"40.4","longitude":"-3.7"}"#,
            ))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "El campo password es requerido");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_in_envelope() {
        for body in [r#"{"email": 5}"#, "{not json", r#"{"latitude":"norte"}"#] {
            let uri = if body.contains("latitude") { "/api/register" } else { "/api/login" };
            let req = Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            let (status, bytes) = call(req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["success"], false);
            assert!(json["error"].as_str().unwrap().starts_with("Cuerpo JSON inválido"));
            assert!(json["metadata"]["timestamp"].is_string());
        }
    }
}
