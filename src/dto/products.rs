use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::products::{Category, ProductType},
    models::Product,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryChoice {
    pub value: Category,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductTypeChoice {
    pub value: ProductType,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogChoices {
    pub categories: Vec<CategoryChoice>,
    pub product_types: Vec<ProductTypeChoice>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVariantRequest {
    pub stock: Option<i32>,
    pub price: Option<i64>,
}
