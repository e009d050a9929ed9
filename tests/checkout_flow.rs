mod common;

use std::sync::Arc;

use footwear_store_api::{
    dto::{
        cart::{AddToCartRequest, UpdateCartRequest},
        orders::{CheckoutRequest, ReturnOrderRequest, UpdateOrderStatusRequest},
    },
    entity::{
        AuditLogs, Returns, audit_logs,
        orders::{OrderStatus, PaymentStatus},
        returns::{self, ReturnReason, ReturnStatus},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::Order,
    routes::params::OrderListQuery,
    services::{cart_service, catalog_service, order_service},
    state::AppState,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use common::{RecordingOtpSender, create_user, seed_variant, setup_state, stock_of};

fn checkout_request(selected: &[Uuid]) -> CheckoutRequest {
    CheckoutRequest {
        selected_items: selected
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(","),
        shipping_address: "12 Harbour Road".into(),
        city: "Kochi".into(),
        state: "Kerala".into(),
        zip_code: "682001".into(),
        phone_number: "9847000000".into(),
        payment_method: None,
    }
}

async fn add(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
    quantity: i32,
) -> Result<Uuid, AppError> {
    let request = AddToCartRequest { variant_id, quantity };
    let resp = cart_service::add_to_cart(state, user, request).await?;
    Ok(resp.data.map(|item| item.id).unwrap_or_default())
}

async fn place_order(state: &AppState, user: &AuthUser, variant_id: Uuid) -> anyhow::Result<Order> {
    let line = add(state, user, variant_id, 1).await?;
    let resp = order_service::checkout(state, user, checkout_request(&[line])).await?;
    Ok(resp.data.expect("order").order)
}

async fn deliver(state: &AppState, admin: &AuthUser, order_id: Uuid) -> anyhow::Result<()> {
    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        let request = UpdateOrderStatusRequest { status };
        order_service::advance_status(state, admin, order_id, request).await?;
    }
    Ok(())
}

// Cart merge, checkout, order lifecycle and the last-unit race, against a real database.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checkout_and_order_lifecycle() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(RecordingOtpSender::default())).await?;

    let shopper = create_user(&state, "shopper", "user").await?;
    let other = create_user(&state, "other", "user").await?;
    let admin = create_user(&state, "admin", "admin").await?;

    // Merging into an existing line re-checks stock and leaves the row alone on failure.
    let runner = seed_variant(&state, "Trail Runner", 5, 8_999).await?;
    let line_a = add(&state, &shopper, runner.variant_id, 3).await?;
    let err = add(&state, &shopper, runner.variant_id, 3).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(id) if id == runner.variant_id));
    let cart = cart_service::list_cart(&state, &shopper).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);

    assert!(matches!(
        add(&state, &shopper, runner.variant_id, 0).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        add(&state, &shopper, Uuid::new_v4(), 1).await,
        Err(AppError::NotFound)
    ));

    cart_service::update_cart(&state, &shopper, line_a, UpdateCartRequest { quantity: 2 }).await?;
    let cart_updates = AuditLogs::find()
        .filter(audit_logs::Column::Action.eq("cart_update"))
        .count(&state.orm)
        .await?;
    assert_eq!(cart_updates, 1);

    // Concurrent adds of the same variant merge into one line.
    let twin = create_user(&state, "twin", "user").await?;
    let slip_on = seed_variant(&state, "Slip On", 5, 3_999).await?;
    let (left, right) = tokio::join!(
        add(&state, &twin, slip_on.variant_id, 2),
        add(&state, &twin, slip_on.variant_id, 2),
    );
    assert_eq!(left?, right?);
    let twin_cart = cart_service::list_cart(&state, &twin).await?.data.expect("cart");
    assert_eq!(twin_cart.items.len(), 1);
    assert_eq!(twin_cart.items[0].quantity, 4);

    let sandal = seed_variant(&state, "Beach Sandal", 4, 2_450).await?;
    let line_b = add(&state, &shopper, sandal.variant_id, 1).await?;
    let foreign_line = add(&state, &other, sandal.variant_id, 1).await?;

    // Warm the product cache so the checkout has something to invalidate.
    let before = catalog_service::get_product(&state, runner.product_id).await?;
    let before = before.data.expect("detail");
    assert_eq!(before.variants[0].stock, 5);

    // Foreign ids are dropped silently; only the selected own line is bought.
    let selection = checkout_request(&[line_a, foreign_line]);
    let resp = order_service::checkout(&state, &shopper, selection).await?;
    let placed = resp.data.expect("order");
    assert_eq!(placed.order.total_amount, 2 * 8_999);
    let summed: i64 = placed.items.iter().map(|item| item.line_total()).sum();
    assert_eq!(summed, placed.order.total_amount);
    assert_eq!(placed.order.order_status, OrderStatus::Processing);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert_eq!(placed.order.payment_method, "COD");

    assert_eq!(stock_of(&state, runner.variant_id).await?, 3);
    assert_eq!(stock_of(&state, sandal.variant_id).await?, 4);
    let remaining = cart_service::list_cart(&state, &shopper).await?.data.expect("cart");
    assert_eq!(remaining.items.iter().map(|l| l.id).collect::<Vec<_>>(), vec![line_b]);
    let others_cart = cart_service::list_cart(&state, &other).await?.data.expect("cart");
    assert_eq!(others_cart.items.len(), 1);

    let after = catalog_service::get_product(&state, runner.product_id).await?;
    let after = after.data.expect("detail");
    assert_eq!(after.variants[0].stock, 3);

    // Selections that resolve to nothing, or do not parse.
    assert!(matches!(
        order_service::checkout(&state, &shopper, checkout_request(&[foreign_line])).await,
        Err(AppError::NoItemsSelected)
    ));
    let mut garbled = checkout_request(&[line_b]);
    garbled.selected_items = "12,abc".into();
    assert!(matches!(
        order_service::checkout(&state, &shopper, garbled).await,
        Err(AppError::Validation(_))
    ));
    let mut no_city = checkout_request(&[line_b]);
    no_city.city = "  ".into();
    assert!(matches!(
        order_service::checkout(&state, &shopper, no_city).await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(stock_of(&state, sandal.variant_id).await?, 4);

    // Cancel only from Processing.
    let cancelled = order_service::cancel_order(&state, &shopper, placed.order.id).await?;
    let cancelled = cancelled.data.expect("order");
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
    assert!(matches!(
        order_service::cancel_order(&state, &shopper, placed.order.id).await,
        Err(AppError::StateTransitionNotAllowed { .. })
    ));
    assert!(matches!(
        order_service::cancel_order(&state, &other, placed.order.id).await,
        Err(AppError::NotFound)
    ));

    // Returns only from Delivered, exactly one pending return row.
    let order = place_order(&state, &shopper, runner.variant_id).await?;
    let reason = || ReturnOrderRequest {
        reason: ReturnReason::WrongSize,
        description: "Too snug".into(),
    };
    assert!(matches!(
        order_service::initiate_return(&state, &shopper, order.id, reason()).await,
        Err(AppError::ReturnNotAllowed)
    ));
    assert!(matches!(
        order_service::advance_status(
            &state,
            &shopper,
            order.id,
            UpdateOrderStatusRequest { status: OrderStatus::Shipped }
        )
        .await,
        Err(AppError::Forbidden)
    ));
    order_service::cancel_order(&state, &shopper, order.id).await?;

    let order = place_order(&state, &shopper, runner.variant_id).await?;
    deliver(&state, &admin, order.id).await?;
    let created = order_service::initiate_return(&state, &shopper, order.id, reason())
        .await?
        .data
        .expect("return");
    assert_eq!(created.order.order_status, OrderStatus::Returned);
    assert_eq!(created.return_request.status, ReturnStatus::Pending);
    let return_rows = Returns::find()
        .filter(returns::Column::OrderId.eq(order.id))
        .count(&state.orm)
        .await?;
    assert_eq!(return_rows, 1);
    assert!(matches!(
        order_service::initiate_return(&state, &shopper, order.id, reason()).await,
        Err(AppError::ReturnNotAllowed)
    ));

    // The legacy return path records a return too.
    let order = place_order(&state, &shopper, sandal.variant_id).await?;
    deliver(&state, &admin, order.id).await?;
    let legacy = order_service::return_order(&state, &shopper, order.id).await?;
    let legacy = legacy.data.expect("return");
    assert_eq!(legacy.return_request.reason, ReturnReason::Other);
    assert_eq!(legacy.return_request.description, "");

    let history = order_service::list_orders(
        &state,
        &shopper,
        OrderListQuery {
            status: Some(OrderStatus::Returned),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(history.data.expect("orders").items.len(), 2);

    // Two buyers race for the last pair.
    let last_pair = seed_variant(&state, "Chelsea Boot", 1, 12_950).await?;
    let line_one = add(&state, &shopper, last_pair.variant_id, 1).await?;
    let line_two = add(&state, &other, last_pair.variant_id, 1).await?;
    let (first, second) = tokio::join!(
        order_service::checkout(&state, &shopper, checkout_request(&[line_one])),
        order_service::checkout(&state, &other, checkout_request(&[line_two])),
    );
    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::InsufficientStock(id)) if id == last_pair.variant_id));
    assert_eq!(stock_of(&state, last_pair.variant_id).await?, 0);

    let checkout_audits = AuditLogs::find()
        .filter(audit_logs::Column::Action.eq("checkout"))
        .count(&state.orm)
        .await?;
    assert_eq!(checkout_audits, 5);

    Ok(())
}
