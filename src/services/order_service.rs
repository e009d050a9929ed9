use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    cache::{self, keys},
    dto::orders::{
        CheckoutRequest, OrderList, OrderWithItems, ReturnCreated, ReturnOrderRequest,
        UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Model as CartModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus, PaymentStatus,
        },
        product_variants::{Column as VariantCol, Entity as ProductVariants, Model as VariantModel},
        returns::{ActiveModel as ReturnActive, Model as ReturnModel, ReturnReason, ReturnStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, ReturnRequest},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{catalog_service, required_field},
    state::AppState,
};

const DEFAULT_PAYMENT_METHOD: &str = "COD";

/// Shipping fields copied onto the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetails {
    pub shipping_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub payment_method: String,
}

impl ShippingDetails {
    pub fn from_request(payload: &CheckoutRequest) -> AppResult<Self> {
        Ok(Self {
            shipping_address: required_field("shipping_address", &payload.shipping_address, 2000)?,
            city: required_field("city", &payload.city, 100)?,
            state: required_field("state", &payload.state, 100)?,
            zip_code: required_field("zip_code", &payload.zip_code, 20)?,
            phone_number: required_field("phone_number", &payload.phone_number, 20)?,
            payment_method: match payload.payment_method.as_deref().map(str::trim) {
                None | Some("") => DEFAULT_PAYMENT_METHOD.to_string(),
                Some(method) => required_field("payment_method", method, 50)?,
            },
        })
    }
}

/// Parse the comma-separated cart line ids submitted with a checkout.
pub fn parse_selected_items(raw: &str) -> AppResult<Vec<Uuid>> {
    let mut ids = raw
        .split(',')
        .map(|part| Uuid::parse_str(part.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AppError::validation("Invalid selection"))?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub cart_id: Uuid,
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub total_amount: i64,
}

/// Price the selected lines against freshly locked variants and make sure
/// every variant still has enough stock for the combined requested quantity.
pub fn plan_checkout(
    lines: &[CartModel],
    variants: &HashMap<Uuid, VariantModel>,
) -> AppResult<CheckoutPlan> {
    if lines.is_empty() {
        return Err(AppError::NoItemsSelected);
    }

    let mut requested: BTreeMap<Uuid, i64> = BTreeMap::new();
    let mut planned = Vec::with_capacity(lines.len());
    let mut total_amount: i64 = 0;

    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::validation("Cart has invalid quantity"));
        }
        let variant = variants.get(&line.variant_id).ok_or(AppError::NotFound)?;
        *requested.entry(variant.id).or_default() += i64::from(line.quantity);
        total_amount += variant.price * i64::from(line.quantity);
        planned.push(PlannedLine {
            cart_id: line.id,
            variant_id: variant.id,
            product_id: variant.product_id,
            quantity: line.quantity,
            price: variant.price,
        });
    }

    for (variant_id, quantity) in requested {
        let stock = variants.get(&variant_id).map_or(0, |v| i64::from(v.stock));
        if quantity > stock {
            return Err(AppError::InsufficientStock(variant_id));
        }
    }

    Ok(CheckoutPlan {
        lines: planned,
        total_amount,
    })
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::StateTransitionNotAllowed {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Turn the selected cart lines into an order in a single transaction.
///
/// Variant rows are locked in id order and stock is re-checked under the
/// lock, so concurrent checkouts of the same variant serialize and the loser
/// gets `InsufficientStock` instead of driving stock negative.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let selected = parse_selected_items(&payload.selected_items)?;
    let shipping = ShippingDetails::from_request(&payload)?;

    let txn = state.orm.begin().await?;

    let lines = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::Id.is_in(selected))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .order_by_asc(CartCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::NoItemsSelected);
    }

    let mut variant_ids: Vec<Uuid> = lines.iter().map(|line| line.variant_id).collect();
    variant_ids.sort();
    variant_ids.dedup();
    let variants: HashMap<Uuid, VariantModel> = ProductVariants::find()
        .filter(VariantCol::Id.is_in(variant_ids))
        .order_by_asc(VariantCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|variant| (variant.id, variant))
        .collect();

    let plan = match plan_checkout(&lines, &variants) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::info!(user_id = %user.user_id, error = %err, "checkout rejected");
            return Err(err);
        }
    };

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        order_date: Set(now.into()),
        shipping_address: Set(shipping.shipping_address),
        city: Set(shipping.city),
        state: Set(shipping.state),
        zip_code: Set(shipping.zip_code),
        phone_number: Set(shipping.phone_number),
        total_amount: Set(plan.total_amount),
        payment_method: Set(shipping.payment_method),
        payment_status: Set(PaymentStatus::Pending),
        order_status: Set(OrderStatus::Processing),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(plan.lines.len());
    for line in &plan.lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            variant_id: Set(line.variant_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        ProductVariants::update_many()
            .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(line.quantity))
            .filter(VariantCol::Id.eq(line.variant_id))
            .exec(&txn)
            .await?;
    }

    let cart_ids: Vec<Uuid> = plan.lines.iter().map(|line| line.cart_id).collect();
    CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::Id.is_in(cart_ids))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let mut product_ids: Vec<Uuid> = plan.lines.iter().map(|line| line.product_id).collect();
    product_ids.sort();
    product_ids.dedup();
    catalog_service::invalidate_products(state.cache.as_ref(), &product_ids).await;
    invalidate_recent_orders(state, user.user_id).await;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        lines = items.len(),
        total = order.total_amount,
        "order placed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed successfully!",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(owned_order(user, id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::OrderStatus.eq(status));
    }

    let finder = Orders::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::OrderDate),
        SortOrder::Desc => finder.order_by_desc(OrderCol::OrderDate),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Cancel an order that has not shipped yet.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = Orders::find()
        .filter(owned_order(user, id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    ensure_transition(order.order_status, OrderStatus::Cancelled)?;

    let payment_status = order.payment_status;
    let mut active: OrderActive = order.into();
    active.order_status = Set(OrderStatus::Cancelled);
    if payment_status == PaymentStatus::Pending {
        active.payment_status = Set(PaymentStatus::Cancelled);
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    invalidate_recent_orders(state, user.user_id).await;
    audit::record(
        &state.pool,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Open a return for a delivered order: records a pending return request and
/// marks the order returned, atomically.
pub async fn initiate_return(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReturnOrderRequest,
) -> AppResult<ApiResponse<ReturnCreated>> {
    let description = payload.description.trim().to_string();

    let txn = state.orm.begin().await?;
    let order = Orders::find()
        .filter(owned_order(user, id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !order.order_status.can_transition_to(OrderStatus::Returned) {
        return Err(AppError::ReturnNotAllowed);
    }

    let return_request = ReturnActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(user.user_id),
        reason: Set(payload.reason),
        description: Set(description),
        status: Set(ReturnStatus::Pending),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    let mut active: OrderActive = order.into();
    active.order_status = Set(OrderStatus::Returned);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    invalidate_recent_orders(state, user.user_id).await;
    audit::record(
        &state.pool,
        user.user_id,
        "order_return",
        "returns",
        serde_json::json!({ "order_id": order.id, "return_id": return_request.id }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("Return request for Order #{} has been submitted successfully.", order.id),
        ReturnCreated {
            order: order_from_entity(order),
            return_request: return_from_entity(return_request),
        },
        Some(Meta::empty()),
    ))
}

/// Legacy one-click return; goes through the same path as a full return request.
pub async fn return_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ReturnCreated>> {
    initiate_return(
        state,
        user,
        id,
        ReturnOrderRequest {
            reason: ReturnReason::Other,
            description: String::new(),
        },
    )
    .await
}

/// Fulfilment updates made by staff: Processing -> Shipped -> Delivered.
pub async fn advance_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    if !matches!(payload.status, OrderStatus::Shipped | OrderStatus::Delivered) {
        return Err(AppError::validation(
            "Only Shipped and Delivered can be set here; use the cancel or return endpoints",
        ));
    }

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_transition(order.order_status, payload.status)?;

    let mut active: OrderActive = order.into();
    active.order_status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    invalidate_recent_orders(state, order.user_id).await;
    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.order_status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

fn owned_order(user: &AuthUser, id: Uuid) -> Condition {
    Condition::all()
        .add(OrderCol::Id.eq(id))
        .add(OrderCol::UserId.eq(user.user_id))
}

async fn invalidate_recent_orders(state: &AppState, user_id: Uuid) {
    cache::invalidate(state.cache.as_ref(), &[keys::account_recent_orders(user_id)]).await;
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_date: model.order_date.with_timezone(&Utc),
        shipping_address: model.shipping_address,
        city: model.city,
        state: model.state,
        zip_code: model.zip_code,
        phone_number: model.phone_number,
        total_amount: model.total_amount,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        order_status: model.order_status,
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        variant_id: model.variant_id,
        quantity: model.quantity,
        price: model.price,
    }
}

fn return_from_entity(model: ReturnModel) -> ReturnRequest {
    ReturnRequest {
        id: model.id,
        order_id: model.order_id,
        user_id: model.user_id,
        reason: model.reason,
        description: model.description,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            selected_items: String::new(),
            shipping_address: " 12 Harbour Road ".into(),
            city: "Kochi".into(),
            state: "Kerala".into(),
            zip_code: "682001".into(),
            phone_number: "+91 98470 00000".into(),
            payment_method: None,
        }
    }

    fn variant(stock: i32, price: i64) -> VariantModel {
        VariantModel {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            color_id: Uuid::new_v4(),
            size_id: Uuid::new_v4(),
            stock,
            price,
        }
    }

    fn line(variant: &VariantModel, quantity: i32) -> CartModel {
        let now = Utc::now().into();
        CartModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            variant_id: variant.id,
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    fn by_id(variants: &[&VariantModel]) -> HashMap<Uuid, VariantModel> {
        variants.iter().map(|v| (v.id, (*v).clone())).collect()
    }

    #[test]
    fn selected_items_parse_and_dedupe() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_selected_items(&format!("{a}, {b},{a}")).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn malformed_selection_is_rejected() {
        assert!(matches!(parse_selected_items(""), Err(AppError::Validation(_))));
        assert!(matches!(parse_selected_items("12,abc"), Err(AppError::Validation(_))));
    }

    #[test]
    fn shipping_fields_are_trimmed_and_defaulted() {
        let details = ShippingDetails::from_request(&checkout_request()).unwrap();
        assert_eq!(details.shipping_address, "12 Harbour Road");
        assert_eq!(details.payment_method, "COD");
    }

    #[test]
    fn blank_or_oversized_shipping_fields_fail() {
        let mut blank = checkout_request();
        blank.city = "   ".into();
        assert!(matches!(ShippingDetails::from_request(&blank), Err(AppError::Validation(_))));

        let mut long = checkout_request();
        long.zip_code = "1".repeat(21);
        assert!(matches!(ShippingDetails::from_request(&long), Err(AppError::Validation(_))));
    }

    #[test]
    fn plan_totals_match_line_prices() {
        let boots = variant(5, 8_999);
        let sandals = variant(2, 2_450);
        let lines = vec![line(&boots, 2), line(&sandals, 1)];

        let plan = plan_checkout(&lines, &by_id(&[&boots, &sandals])).unwrap();

        let summed: i64 = plan.lines.iter().map(|l| l.price * i64::from(l.quantity)).sum();
        assert_eq!(plan.total_amount, 2 * 8_999 + 2_450);
        assert_eq!(plan.total_amount, summed);
        assert_eq!(plan.lines[0].product_id, boots.product_id);
    }

    #[test]
    fn plan_rejects_quantity_above_locked_stock() {
        let last_pair = variant(1, 5_000);
        let lines = vec![line(&last_pair, 2)];
        let err = plan_checkout(&lines, &by_id(&[&last_pair])).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(id) if id == last_pair.id));
    }

    #[test]
    fn plan_sums_quantities_per_variant() {
        let v = variant(3, 1_000);
        let lines = vec![line(&v, 2), line(&v, 2)];
        assert!(matches!(
            plan_checkout(&lines, &by_id(&[&v])),
            Err(AppError::InsufficientStock(_))
        ));
    }

    #[test]
    fn empty_plan_is_no_items_selected() {
        assert!(matches!(
            plan_checkout(&[], &HashMap::new()),
            Err(AppError::NoItemsSelected)
        ));
    }

    #[test]
    fn transition_errors_name_both_states() {
        let err = ensure_transition(OrderStatus::Shipped, OrderStatus::Cancelled).unwrap_err();
        assert_eq!(err.to_string(), "Order cannot move from Shipped to Cancelled");
        assert!(ensure_transition(OrderStatus::Processing, OrderStatus::Cancelled).is_ok());
    }
}
