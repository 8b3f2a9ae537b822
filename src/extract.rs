//! Request extractors whose rejections render as `ApiError`, so malformed
//! bodies, path segments and query strings still get the envelope.

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::validation(format!("Cuerpo JSON inválido: {}", r.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::validation(format!("Parámetro de ruta inválido: {}", r.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::validation(format!("Parámetros de consulta inválidos: {}", r.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::get,
        Router,
    };
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Counter {
        count: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Page {
        page: u32,
    }

    fn router() -> Router {
        Router::new()
            .route("/items/:id", get(|ApiPath(id): ApiPath<Uuid>| async move { id.to_string() }))
            .route(
                "/items",
                get(|ApiQuery(q): ApiQuery<Page>| async move { q.page.to_string() })
                    .post(|ApiJson(c): ApiJson<Counter>| async move { c.count.to_string() }),
            )
    }

    async fn rejected(req: Request<Body>) -> Value {
        let res = router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert!(json["metadata"]["timestamp"].is_string());
        json
    }

    #[tokio::test]
    async fn bad_path_uuid_gets_envelope() {
        let json = rejected(Request::get("/items/not-a-uuid").body(Body::empty()).unwrap()).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Parámetro de ruta inválido"));
    }

    #[tokio::test]
    async fn bad_query_gets_envelope() {
        let json = rejected(Request::get("/items?page=abc").body(Body::empty()).unwrap()).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Parámetros de consulta inválidos"));
    }

    #[tokio::test]
    async fn wrong_json_type_gets_envelope() {
        let req = Request::post("/items")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"count":"many"}"#))
            .unwrap();
        let json = rejected(req).await;
        assert!(json["error"].as_str().unwrap().starts_with("Cuerpo JSON inválido"));
    }

    #[tokio::test]
    async fn missing_content_type_gets_envelope() {
        let req = Request::post("/items").body(Body::from("{}")).unwrap();
        rejected(req).await;
    }

    #[tokio::test]
    async fn valid_path_passes_through() {
        let id = Uuid::new_v4();
        let res = router()
            .oneshot(Request::get(format!("/items/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
