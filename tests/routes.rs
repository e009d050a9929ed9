use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use footwear_store_api::{
    cache::NoCache, config::AppConfig, routes::create_router, services::auth_service::issue_token,
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

// Lazy pool: these requests are answered before any query runs.
fn offline_state() -> AppState {
    let config = AppConfig {
        database_url: "postgres://localhost/unused".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "router-secret".into(),
        otp_ttl: Duration::from_secs(300),
        cache_default_ttl: Duration::from_secs(900),
        cache_enabled: false,
        cors_origins: Vec::new(),
    };
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    AppState::new(pool, Arc::new(NoCache), &config)
}

#[tokio::test]
async fn health_is_public() {
    let app = create_router().with_state(offline_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_cart_request_redirects_to_login() {
    let app = create_router().with_state(offline_state());
    let response = app
        .oneshot(Request::get("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login?next=%2Fcart"
    );
}

#[tokio::test]
async fn login_redirect_keeps_nested_prefix_and_query() {
    let cases = [
        (
            Request::get("/account/profile?tab=orders"),
            "/auth/login?next=%2Faccount%2Fprofile%3Ftab%3Dorders",
        ),
        (Request::post("/cart/add"), "/auth/login?next=%2Fcart%2Fadd"),
        (Request::get("/my-orders?page=2"), "/auth/login?next=%2Fmy-orders%3Fpage%3D2"),
    ];
    for (builder, expected) in cases {
        let app = create_router().with_state(offline_state());
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), expected);
    }
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let state = offline_state();
    let token = issue_token(
        &state.auth.jwt_secret,
        Uuid::new_v4(),
        "user",
        chrono::Duration::hours(1),
    )
    .unwrap();
    let app = create_router().with_state(state);
    let request = Request::patch(format!("/admin/variants/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"stock":3}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
