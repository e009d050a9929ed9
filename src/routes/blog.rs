use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::blog::{BlogOverview, CategoryPosts},
    error::AppResult,
    models::BlogPost,
    response::ApiResponse,
    services::blog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/posts/{id}", get(get_post))
        .route("/categories/{slug}", get(category_posts))
}

#[utoipa::path(
    get,
    path = "/blog",
    responses(
        (status = 200, description = "Featured post, latest posts and categories", body = ApiResponse<BlogOverview>),
    ),
    tag = "Blog"
)]
pub async fn overview(State(state): State<AppState>) -> AppResult<Json<ApiResponse<BlogOverview>>> {
    let resp = blog_service::overview(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/blog/posts/{id}",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Blog post", body = ApiResponse<BlogPost>),
        (status = 404, description = "Not found"),
    ),
    tag = "Blog"
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BlogPost>>> {
    let resp = blog_service::get_post(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/blog/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category with its posts", body = ApiResponse<CategoryPosts>),
        (status = 404, description = "Not found"),
    ),
    tag = "Blog"
)]
pub async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<CategoryPosts>>> {
    let resp = blog_service::category_posts(&state, &slug).await?;
    Ok(Json(resp))
}
