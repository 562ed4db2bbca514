use super::*;

fn rate_limited() -> ApiError {
    ApiError::RateLimited {
        message: "You have exceeded the hourly limit of 5 requests for none plan".into(),
        retry_after: 1800,
        current_plan: "none".into(),
        upgrade_message: "Consider subscribing".into(),
    }
}

// =============================================================================
// status
// =============================================================================

#[test]
fn status_invalid_input_is_400() {
    assert_eq!(ApiError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
}

#[test]
fn status_unauthorized_is_401() {
    assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn status_forbidden_is_403() {
    assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
}

#[test]
fn status_not_found_is_404() {
    assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
}

#[test]
fn status_timeout_is_408() {
    assert_eq!(ApiError::Timeout("x".into()).status(), StatusCode::REQUEST_TIMEOUT);
}

#[test]
fn status_unprocessable_is_422() {
    assert_eq!(
        ApiError::UnprocessableContent("x".into()).status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn status_rate_limited_is_429() {
    assert_eq!(rate_limited().status(), StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn status_store_unavailable_is_503() {
    assert_eq!(ApiError::StoreUnavailable("x".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn status_internal_is_500() {
    assert_eq!(ApiError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// category
// =============================================================================

#[test]
fn category_strings_are_snake_case() {
    assert_eq!(ApiError::InvalidInput("x".into()).category(), "invalid_input");
    assert_eq!(ApiError::NotFound("x".into()).category(), "not_found");
    assert_eq!(ApiError::UnprocessableContent("x".into()).category(), "unprocessable_content");
    assert_eq!(rate_limited().category(), "rate_limited");
    assert_eq!(ApiError::StoreUnavailable("x".into()).category(), "store_unavailable");
}

// =============================================================================
// into_response
// =============================================================================

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn response_body_has_error_and_message() {
    let response = ApiError::NotFound("deck not found".into()).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "deck not found");
}

#[tokio::test]
async fn rate_limited_body_carries_quota_fields() {
    let response = rate_limited().into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = body_json(response).await;
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(
        body["message"],
        "You have exceeded the hourly limit of 5 requests for none plan"
    );
    assert_eq!(body["retryAfter"], 1800);
    assert_eq!(body["currentPlan"], "none");
    assert_eq!(body["upgradeMessage"], "Consider subscribing");
}

#[tokio::test]
async fn plain_error_body_has_no_quota_fields() {
    let body = body_json(ApiError::Internal("oops".into()).into_response()).await;
    assert!(body.get("retryAfter").is_none());
    assert!(body.get("currentPlan").is_none());
}

// =============================================================================
// From<sqlx::Error>
// =============================================================================

#[test]
fn sqlx_error_maps_to_internal_without_detail() {
    let err = ApiError::from(sqlx::Error::RowNotFound);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.to_string(), "database error");
}
