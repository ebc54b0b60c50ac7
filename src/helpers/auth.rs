use std::sync::Arc;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;
use crate::error::AppError;

#[derive(Clone)]
pub struct ManagerToken(pub Arc<str>);

/// Lets the request through only with `Authorization: Bearer <manager token>`.
pub async fn require_manager<B>(
    State(token): State<ManagerToken>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map_or(false, |provided| provided == &*token.0);

    if !authorized {
        warn!("Rejected back-office request to: {}", request.uri().path());
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;
    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/orders", get(|| async { "orders" }))
            .route_layer(from_fn_with_state(ManagerToken(Arc::from("s3cret")), require_manager))
    }

    async fn status_for(authorization: Option<&str>) -> StatusCode {
        let mut request = Request::builder().uri("/orders");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn valid_token_passes() {
        assert_eq!(status_for(Some("Bearer s3cret")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_wrong_token_is_unauthorized() {
        assert_eq!(status_for(None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(Some("Bearer wrong")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(Some("s3cret")).await, StatusCode::UNAUTHORIZED);
    }
}
