use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    entity::{
        orders::OrderStatus,
        products::{Category, ProductType},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub enum ProductSort {
    #[serde(rename = "price-asc")]
    PriceAsc,
    #[serde(rename = "price-desc")]
    PriceDesc,
    #[default]
    #[serde(rename = "newest")]
    Newest,
}

impl ProductSort {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductSort::PriceAsc => "price-asc",
            ProductSort::PriceDesc => "price-desc",
            ProductSort::Newest => "newest",
        }
    }
}

/// Price bands in major currency units; prices are stored in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub enum PriceBand {
    #[serde(rename = "0-50")]
    UpTo50,
    #[serde(rename = "50-100")]
    From50To100,
    #[serde(rename = "100+")]
    Over100,
}

impl PriceBand {
    /// Inclusive bounds in cents.
    pub fn bounds(self) -> (i64, Option<i64>) {
        match self {
            PriceBand::UpTo50 => (0, Some(5_000)),
            PriceBand::From50To100 => (5_000, Some(10_000)),
            PriceBand::Over100 => (10_000, None),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriceBand::UpTo50 => "0-50",
            PriceBand::From50To100 => "50-100",
            PriceBand::Over100 => "100+",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Comma-separated categories, e.g. `MEN,KIDS`.
    pub category: Option<String>,
    /// Comma-separated product types, e.g. `BOOTS,SANDALS`.
    pub product_type: Option<String>,
    pub price: Option<PriceBand>,
    pub sort: Option<ProductSort>,
}

/// Validated, normalized catalog filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilters {
    pub categories: Vec<Category>,
    pub product_types: Vec<ProductType>,
    pub price: Option<PriceBand>,
    pub sort: ProductSort,
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl ProductFilters {
    /// Stable textual form used inside listing cache keys.
    pub fn fingerprint(&self) -> String {
        let join = |values: Vec<String>| values.join(",");
        let categories = join(self.categories.iter().map(serde_plain).collect());
        let types = join(self.product_types.iter().map(serde_plain).collect());
        format!(
            "c={categories}|t={types}|p={}|s={}|pg={}|pp={}",
            self.price.map(PriceBand::as_str).unwrap_or(""),
            self.sort.as_str(),
            self.page,
            self.per_page,
        )
    }
}

fn serde_plain<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

fn parse_list<T: serde::de::DeserializeOwned + Ord>(
    raw: Option<&str>,
    what: &str,
) -> AppResult<Vec<T>> {
    let mut values = Vec::new();
    for part in raw.unwrap_or_default().split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let value = serde_json::from_value::<T>(serde_json::Value::String(part.to_string()))
            .map_err(|_| AppError::validation(format!("Unknown {what} '{part}'")))?;
        values.push(value);
    }
    values.sort();
    values.dedup();
    Ok(values)
}

impl ProductQuery {
    pub fn into_filters(self) -> AppResult<ProductFilters> {
        let (page, per_page, offset) = Pagination {
            page: self.page,
            per_page: self.per_page,
        }
        .normalize();
        Ok(ProductFilters {
            categories: parse_list(self.category.as_deref(), "category")?,
            product_types: parse_list(self.product_type.as_deref(), "product type")?,
            price: self.price,
            sort: self.sort.unwrap_or_default(),
            page,
            per_page,
            offset,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}
