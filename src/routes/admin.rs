use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        blog::{CategoryRequest, PostRequest},
        orders::UpdateOrderStatusRequest,
        products::UpdateVariantRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{BlogCategory, BlogPost, Order, Variant},
    response::ApiResponse,
    services::{blog_service, catalog_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/variants/{id}", patch(update_variant))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/blog/posts", post(create_post))
        .route("/blog/posts/{id}", put(update_post).delete(delete_post))
        .route("/blog/categories", put(upsert_category))
}

#[utoipa::path(
    patch,
    path = "/admin/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant id")),
    request_body = UpdateVariantRequest,
    responses(
        (status = 200, description = "Variant stock/price updated", body = ApiResponse<Variant>),
        (status = 400, description = "Negative stock or price"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVariantRequest>,
) -> AppResult<Json<ApiResponse<Variant>>> {
    let resp = catalog_service::update_variant(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order moved to Shipped or Delivered", body = ApiResponse<Order>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::advance_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/blog/posts",
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post created", body = ApiResponse<BlogPost>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PostRequest>,
) -> AppResult<Json<ApiResponse<BlogPost>>> {
    let resp = blog_service::create_post(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/admin/blog/posts/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post updated", body = ApiResponse<BlogPost>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostRequest>,
) -> AppResult<Json<ApiResponse<BlogPost>>> {
    let resp = blog_service::update_post(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/admin/blog/posts/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = blog_service::delete_post(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/admin/blog/categories",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category created or renamed", body = ApiResponse<BlogCategory>),
        (status = 400, description = "Slug invalid or in use"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn upsert_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<BlogCategory>>> {
    let resp = blog_service::upsert_category(&state, &user, payload).await?;
    Ok(Json(resp))
}
