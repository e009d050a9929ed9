use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    cache::{self, Cache, Expiry, keys},
    dto::products::{
        CatalogChoices, CategoryChoice, ProductList, ProductTypeChoice, UpdateVariantRequest,
    },
    entity::{
        colors::{Column as ColorCol, Entity as Colors},
        product_images::{Column as ImageCol, Entity as ProductImages, Model as ImageModel},
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
            Model as VariantModel,
        },
        products::{
            Category, Column as ProdCol, Entity as Products, Model as ProductModel, ProductType,
        },
        sizes::{Column as SizeCol, Entity as Sizes},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{ColorOption, Product, ProductDetail, ProductImage, SizeOption, Variant},
    response::{ApiResponse, Meta},
    routes::params::{ProductFilters, ProductQuery, ProductSort},
    state::AppState,
};

pub async fn choices(state: &AppState) -> AppResult<ApiResponse<CatalogChoices>> {
    let data = cache::get_or_compute(
        state.cache.as_ref(),
        keys::CATALOG_CHOICES,
        keys::HOUR,
        || async {
            Ok::<_, AppError>(CatalogChoices {
                categories: Category::iter()
                    .map(|value| CategoryChoice {
                        value,
                        label: value.label().to_string(),
                    })
                    .collect(),
                product_types: ProductType::iter()
                    .map(|value| ProductTypeChoice {
                        value,
                        label: value.label().to_string(),
                    })
                    .collect(),
            })
        },
    )
    .await?;
    Ok(ApiResponse::success("Choices", data, Some(Meta::empty())))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let filters = query.into_filters()?;
    let version = listing_version(state.cache.as_ref()).await;
    let key = keys::catalog_list(version, &filters.fingerprint());

    let data = cache::get_or_compute(state.cache.as_ref(), &key, keys::CATALOG_TTL, || {
        load_products(&state.orm, &filters)
    })
    .await?;

    let meta = Meta::new(filters.page, filters.per_page, data.total);
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let data = cache::get_or_compute(
        state.cache.as_ref(),
        &keys::catalog_product(id),
        keys::CATALOG_TTL,
        || load_product_detail(&state.orm, id),
    )
    .await?;
    Ok(ApiResponse::success("Product", data, None))
}

pub async fn update_variant(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateVariantRequest,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    if payload.stock.is_some_and(|stock| stock < 0) {
        return Err(AppError::validation("stock cannot be negative"));
    }
    if payload.price.is_some_and(|price| price < 0) {
        return Err(AppError::validation("price cannot be negative"));
    }

    let txn = state.orm.begin().await?;
    let variant = ProductVariants::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: VariantActive = variant.into();
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    let updated = active.update(&txn).await?;
    let view = variant_views(&txn, vec![updated])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    txn.commit().await?;

    invalidate_products(state.cache.as_ref(), &[view.product_id]).await;
    audit::record(
        &state.pool,
        user.user_id,
        "variant_update",
        "product_variants",
        serde_json::json!({ "variant_id": id, "stock": view.stock, "price": view.price }),
    )
    .await;

    Ok(ApiResponse::success("Variant updated", view, Some(Meta::empty())))
}

/// Current listing generation; bumping it orphans every cached listing page.
pub(crate) async fn listing_version(cache: &dyn Cache) -> u64 {
    match cache::get_json::<u64>(cache, keys::CATALOG_LIST_VERSION).await {
        Ok(Some(version)) => version,
        Ok(None) => 1,
        Err(err) => {
            tracing::warn!(error = %err, "catalog listing version unreadable");
            1
        }
    }
}

/// Drop cached detail pages for `product_ids` and retire all cached listings.
pub(crate) async fn invalidate_products(cache: &dyn Cache, product_ids: &[Uuid]) {
    let detail_keys: Vec<String> = product_ids.iter().copied().map(keys::catalog_product).collect();
    cache::invalidate(cache, &detail_keys).await;

    // The version never expires: a reset would walk back onto live pages.
    let next = listing_version(cache).await + 1;
    let stored = cache::set_json(cache, keys::CATALOG_LIST_VERSION, &next, Expiry::Never).await;
    if let Err(err) = stored {
        tracing::warn!(error = %err, "catalog listing version bump failed");
    }
    cache::invalidate_prefix(cache, keys::CATALOG_LIST_PREFIX).await;
}

async fn load_products<C: ConnectionTrait>(
    conn: &C,
    filters: &ProductFilters,
) -> AppResult<ProductList> {
    let mut condition = Condition::all();
    if !filters.categories.is_empty() {
        condition = condition.add(ProdCol::Category.is_in(filters.categories.clone()));
    }
    if !filters.product_types.is_empty() {
        condition = condition.add(ProdCol::ProductType.is_in(filters.product_types.clone()));
    }
    if let Some(band) = filters.price {
        let (min, max) = band.bounds();
        condition = condition.add(ProdCol::Price.gte(min));
        if let Some(max) = max {
            condition = condition.add(ProdCol::Price.lte(max));
        }
    }

    let finder = Products::find().filter(condition);
    let finder = match filters.sort {
        ProductSort::PriceAsc => finder.order_by_asc(ProdCol::Price),
        ProductSort::PriceDesc => finder.order_by_desc(ProdCol::Price),
        ProductSort::Newest => finder.order_by_desc(ProdCol::CreatedAt),
    };

    let total = finder.clone().count(conn).await? as i64;
    let products = finder
        .limit(filters.per_page as u64)
        .offset(filters.offset as u64)
        .all(conn)
        .await?;

    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut covers: HashMap<Uuid, String> = HashMap::new();
    if !ids.is_empty() {
        let images = ProductImages::find()
            .filter(ImageCol::ProductId.is_in(ids))
            .order_by_asc(ImageCol::Position)
            .all(conn)
            .await?;
        for image in images {
            covers.entry(image.product_id).or_insert(image.image_url);
        }
    }

    let items = products
        .into_iter()
        .map(|p| {
            let cover = covers.remove(&p.id);
            product_from_entity(p, cover)
        })
        .collect();
    Ok(ProductList { items, total })
}

async fn load_product_detail<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ProductDetail> {
    let product = Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let images: Vec<ProductImage> = ProductImages::find()
        .filter(ImageCol::ProductId.eq(id))
        .order_by_asc(ImageCol::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(image_from_entity)
        .collect();

    let variant_models = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(id))
        .all(conn)
        .await?;
    let mut variants = variant_views(conn, variant_models).await?;
    variants.sort_by(|a, b| a.color_name.cmp(&b.color_name).then(a.size.cmp(&b.size)));

    let (color_data, available_colors, available_sizes) = build_color_matrix(&variants);
    let cover = images.first().map(|image| image.image_url.clone());

    Ok(ProductDetail {
        product: product_from_entity(product, cover),
        images,
        variants,
        color_data,
        available_colors,
        available_sizes,
    })
}

/// Resolve product names, colors and sizes for a batch of variants.
pub(crate) async fn variant_views<C: ConnectionTrait>(
    conn: &C,
    variants: Vec<VariantModel>,
) -> AppResult<Vec<Variant>> {
    if variants.is_empty() {
        return Ok(Vec::new());
    }
    let product_ids: Vec<Uuid> = variants.iter().map(|v| v.product_id).collect();
    let color_ids: Vec<Uuid> = variants.iter().map(|v| v.color_id).collect();
    let size_ids: Vec<Uuid> = variants.iter().map(|v| v.size_id).collect();

    let products: HashMap<Uuid, String> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();
    let colors: HashMap<Uuid, (String, String)> = Colors::find()
        .filter(ColorCol::Id.is_in(color_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, (c.code, c.name)))
        .collect();
    let sizes: HashMap<Uuid, i32> = Sizes::find()
        .filter(SizeCol::Id.is_in(size_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|s| (s.id, s.code))
        .collect();

    variants
        .into_iter()
        .map(|v| {
            let product_name = products.get(&v.product_id).cloned();
            let color = colors.get(&v.color_id).cloned();
            let size = sizes.get(&v.size_id).copied();
            match (product_name, color, size) {
                (Some(product_name), Some((color_code, color_name)), Some(size)) => Ok(Variant {
                    id: v.id,
                    product_id: v.product_id,
                    product_name,
                    color_code,
                    color_name,
                    size,
                    stock: v.stock,
                    price: v.price,
                }),
                _ => Err(AppError::Internal(anyhow::anyhow!(
                    "variant {} references missing catalog rows",
                    v.id
                ))),
            }
        })
        .collect()
}

/// Group variants (already ordered by color name then size) into the
/// color -> size -> variant matrix the product page renders.
pub fn build_color_matrix(
    variants: &[Variant],
) -> (BTreeMap<String, ColorOption>, Vec<String>, Vec<i32>) {
    let mut matrix: BTreeMap<String, ColorOption> = BTreeMap::new();
    let mut colors: Vec<String> = Vec::new();
    let mut sizes: Vec<i32> = Vec::new();

    for variant in variants {
        let option = matrix
            .entry(variant.color_code.clone())
            .or_insert_with(|| ColorOption {
                name: variant.color_name.clone(),
                sizes: BTreeMap::new(),
            });
        option.sizes.insert(
            variant.size,
            SizeOption {
                variant_id: variant.id,
                stock: variant.stock,
                size_name: crate::entity::sizes::label(variant.size),
            },
        );
        if !colors.contains(&variant.color_code) {
            colors.push(variant.color_code.clone());
        }
        if !sizes.contains(&variant.size) {
            sizes.push(variant.size);
        }
    }

    (matrix, colors, sizes)
}

fn product_from_entity(model: ProductModel, cover_image: Option<String>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        category: model.category,
        product_type: model.product_type,
        cover_image,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        id: model.id,
        image_url: model.image_url,
        position: model.position,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn variant(color_code: &str, color_name: &str, size: i32, stock: i32) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            product_name: "Trail Runner".into(),
            color_code: color_code.into(),
            color_name: color_name.into(),
            size,
            stock,
            price: 4_999,
        }
    }

    #[test]
    fn color_matrix_groups_sizes_under_colors() {
        let variants = vec![
            variant("#000000", "Black", 7, 3),
            variant("#000000", "Black", 9, 0),
            variant("#FF0000", "Red", 7, 5),
        ];

        let (matrix, colors, sizes) = build_color_matrix(&variants);

        assert_eq!(colors, vec!["#000000", "#FF0000"]);
        assert_eq!(sizes, vec![7, 9]);
        let black = &matrix["#000000"];
        assert_eq!(black.name, "Black");
        assert_eq!(black.sizes.len(), 2);
        assert_eq!(black.sizes[&9].stock, 0);
        assert_eq!(black.sizes[&7].variant_id, variants[0].id);
        assert_eq!(matrix["#FF0000"].sizes[&7].size_name, "Size 7");
    }

    #[test]
    fn empty_variants_give_empty_matrix() {
        let (matrix, colors, sizes) = build_color_matrix(&[]);
        assert!(matrix.is_empty() && colors.is_empty() && sizes.is_empty());
    }

    #[tokio::test]
    async fn invalidating_products_bumps_listing_version() {
        let store = crate::cache::InMemoryCache::new();
        let product_id = Uuid::new_v4();
        cache::set_json(&store, &keys::catalog_product(product_id), &1, Expiry::Default)
            .await
            .unwrap();
        cache::set_json(
            &store,
            &keys::catalog_list(1, "c=|t=|p=|s=newest|pg=1|pp=20"),
            &1,
            Expiry::Default,
        )
        .await
        .unwrap();

        invalidate_products(&store, &[product_id]).await;

        assert_eq!(listing_version(&store).await, 2);
        assert!(store.get_raw(&keys::catalog_product(product_id)).await.unwrap().is_none());
        assert!(store
            .get_raw(&keys::catalog_list(1, "c=|t=|p=|s=newest|pg=1|pp=20"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn listing_version_survives_default_ttl() {
        let store = crate::cache::InMemoryCache::new().with_default_ttl(Duration::from_millis(20));
        invalidate_products(&store, &[]).await;
        invalidate_products(&store, &[]).await;
        assert_eq!(listing_version(&store).await, 3);

        let stale_key = keys::catalog_list(3, "f");
        cache::set_json(&store, &stale_key, "stale", Expiry::After(Duration::from_secs(60)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(listing_version(&store).await, 3);

        invalidate_products(&store, &[]).await;
        assert_eq!(listing_version(&store).await, 4);
        assert!(store.get_raw(&stale_key).await.unwrap().is_none());
    }
}
