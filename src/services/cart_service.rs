use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use sea_orm::sea_query::LockType;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartView, UpdateCartRequest},
    entity::{
        cart_items::{
            ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel,
        },
        product_variants::Entity as ProductVariants,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, CartLine, Variant},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartLineRow {
    cart_id: Uuid,
    quantity: i32,
    variant_id: Uuid,
    stock: i32,
    price: i64,
    product_id: Uuid,
    product_name: String,
    color_code: String,
    color_name: String,
    size: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            id: row.cart_id,
            quantity: row.quantity,
            line_total: row.price * i64::from(row.quantity),
            variant: Variant {
                id: row.variant_id,
                product_id: row.product_id,
                product_name: row.product_name,
                color_code: row.color_code,
                color_name: row.color_name,
                size: row.size,
                stock: row.stock,
                price: row.price,
            },
        }
    }
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               v.id AS variant_id, v.stock, v.price,
               p.id AS product_id, p.name AS product_name,
               c.code AS color_code, c.name AS color_name,
               s.code AS size
        FROM cart_items ci
        JOIN product_variants v ON v.id = ci.variant_id
        JOIN products p ON p.id = v.product_id
        JOIN colors c ON c.id = v.color_id
        JOIN sizes s ON s.id = v.size_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<CartLine> = rows.into_iter().map(CartLine::from).collect();
    let total = cart_total(&items);
    let count = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        CartView { items, total },
        Some(Meta::new(1, count, count)),
    ))
}

pub fn cart_total(items: &[CartLine]) -> i64 {
    items.iter().map(|line| line.line_total).sum()
}

/// Quantity after merging `added` into an existing line, bounded by `stock`.
fn merged_quantity(current: i32, added: i32, variant_id: Uuid, stock: i32) -> AppResult<i32> {
    match current.checked_add(added) {
        Some(merged) if merged <= stock => Ok(merged),
        merged => {
            tracing::debug!(%variant_id, ?merged, stock, "merged cart quantity exceeds stock");
            Err(AppError::InsufficientStock(variant_id))
        }
    }
}

/// Add `quantity` of a variant, merging into an existing line for the same variant.
///
/// The variant row is locked first so concurrent adds by the same user
/// serialize on it and the second one merges instead of inserting.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::validation("Invalid quantity"));
    }

    let txn = state.orm.begin().await?;
    let variant = ProductVariants::find_by_id(payload.variant_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payload.quantity > variant.stock {
        return Err(AppError::InsufficientStock(variant.id));
    }

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::VariantId.eq(variant.id)),
        )
        .one(&txn)
        .await?;

    let (item, message) = match existing {
        Some(line) => {
            let merged =
                merged_quantity(line.quantity, payload.quantity, variant.id, variant.stock)?;
            let mut active: CartActive = line.into();
            active.quantity = Set(merged);
            active.updated_at = Set(Utc::now().into());
            (active.update(&txn).await?, "Cart quantity updated successfully")
        }
        None => {
            let now = Utc::now();
            let item = CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                variant_id: Set(variant.id),
                quantity: Set(payload.quantity),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            (item, "Item added to cart successfully")
        }
    };
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "variant_id": variant.id, "quantity": item.quantity }),
    )
    .await;

    Ok(ApiResponse::success(message, cart_item_from_entity(item), None))
}

pub async fn update_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::validation("Invalid quantity"));
    }

    let line = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::Id.eq(item_id))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let variant = ProductVariants::find_by_id(line.variant_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if payload.quantity > variant.stock {
        return Err(AppError::InsufficientStock(variant.id));
    }

    let mut active: CartActive = line.into();
    active.quantity = Set(payload.quantity);
    active.updated_at = Set(Utc::now().into());
    let item = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": item.id, "quantity": item.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart updated successfully",
        cart_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

/// Delete a line owned by `user`. Missing or foreign ids succeed without effect.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::Id.eq(item_id))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        tracing::debug!(%item_id, "cart line not found for user, nothing removed");
        return Ok(ApiResponse::message_only("Item not in cart"));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::message_only("Item removed from cart"))
}

fn cart_item_from_entity(model: CartModel) -> CartItem {
    CartItem {
        id: model.id,
        variant_id: model.variant_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLineRow {
            cart_id: Uuid::new_v4(),
            quantity,
            variant_id: Uuid::new_v4(),
            stock: 10,
            price,
            product_id: Uuid::new_v4(),
            product_name: "Canvas Low".into(),
            color_code: "#FFFFFF".into(),
            color_name: "White".into(),
            size: 8,
        }
        .into()
    }

    #[test]
    fn line_and_cart_totals() {
        let items = vec![line(2_500, 2), line(1_000, 3)];
        assert_eq!(items[0].line_total, 5_000);
        assert_eq!(cart_total(&items), 8_000);
        assert_eq!(cart_total(&[]), 0);
    }

    #[test]
    fn merge_is_bounded_by_stock() {
        let id = Uuid::new_v4();
        assert_eq!(merged_quantity(3, 2, id, 5).unwrap(), 5);
        assert!(matches!(
            merged_quantity(3, 3, id, 5),
            Err(AppError::InsufficientStock(v)) if v == id
        ));
    }

    #[test]
    fn merge_overflow_is_rejected_not_wrapped() {
        let id = Uuid::new_v4();
        assert!(matches!(
            merged_quantity(i32::MAX, 1, id, i32::MAX),
            Err(AppError::InsufficientStock(_))
        ));
    }
}
