use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::{CatalogChoices, ProductList},
    error::AppResult,
    models::ProductDetail,
    response::ApiResponse,
    routes::params::ProductQuery,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/choices", get(choices))
}

#[utoipa::path(
    get,
    path = "/shop/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category" = Option<String>, Query, description = "Comma-separated: MEN, WOMEN, KIDS"),
        ("product_type" = Option<String>, Query, description = "Comma-separated product types"),
        ("price" = Option<String>, Query, description = "Price band: 0-50, 50-100, 100+"),
        ("sort" = Option<String>, Query, description = "price-asc, price-desc or newest")
    ),
    responses(
        (status = 200, description = "Filtered product listing", body = ApiResponse<ProductList>),
        (status = 400, description = "Unknown filter value"),
    ),
    tag = "Shop"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/shop/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with images and colour/size matrix", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not found"),
    ),
    tag = "Shop"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/shop/choices",
    responses(
        (status = 200, description = "Category and product type labels", body = ApiResponse<CatalogChoices>),
    ),
    tag = "Shop"
)]
pub async fn choices(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CatalogChoices>>> {
    let resp = catalog_service::choices(&state).await?;
    Ok(Json(resp))
}
