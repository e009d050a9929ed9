use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::{orders::OrderStatus, returns::ReturnReason},
    models::{Order, OrderItem, ReturnRequest},
};

/// Shipping snapshot plus the comma-separated cart line ids being bought.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub selected_items: String,
    pub shipping_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnOrderRequest {
    pub reason: ReturnReason,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnCreated {
    pub order: Order,
    pub return_request: ReturnRequest,
}
