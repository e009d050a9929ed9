use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    audit,
    cache::{self, keys},
    dto::account::{AddressList, AddressRequest, ProfileView, UpdateProfileRequest},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Order, User},
    response::{ApiResponse, Meta},
    services::{auth_service::normalize_email, optional_field, order_service, required_field},
    state::AppState,
};

const RECENT_ORDERS: u64 = 3;

/// Validated profile changes; `None` leaves the column untouched.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

impl ProfileChanges {
    pub fn from_request(payload: UpdateProfileRequest) -> AppResult<Self> {
        Ok(Self {
            first_name: payload
                .first_name
                .map(|v| optional_field("first_name", &v, 150))
                .transpose()?,
            last_name: payload
                .last_name
                .map(|v| optional_field("last_name", &v, 150))
                .transpose()?,
            email: payload.email.map(|v| normalize_email(&v)).transpose()?,
            bio: payload.bio.map(|v| optional_field("bio", &v, 500)).transpose()?,
        })
    }
}

pub struct NewAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
}

impl NewAddress {
    pub fn from_request(payload: &AddressRequest) -> AppResult<Self> {
        Ok(Self {
            address: required_field("address", &payload.address, 2000)?,
            city: required_field("city", &payload.city, 100)?,
            state: required_field("state", &payload.state, 100)?,
            zip_code: required_field("zip_code", &payload.zip_code, 20)?,
            phone_number: required_field("phone_number", &payload.phone_number, 20)?,
        })
    }
}

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)
}

async fn load_addresses(state: &AppState, user_id: Uuid) -> AppResult<Vec<Address>> {
    let addresses = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(addresses)
}

async fn cached_addresses(state: &AppState, user_id: Uuid) -> AppResult<Vec<Address>> {
    cache::get_or_compute(
        state.cache.as_ref(),
        &keys::account_addresses(user_id),
        keys::ACCOUNT_TTL,
        || load_addresses(state, user_id),
    )
    .await
}

async fn cached_recent_orders(state: &AppState, user_id: Uuid) -> AppResult<Vec<Order>> {
    cache::get_or_compute(
        state.cache.as_ref(),
        &keys::account_recent_orders(user_id),
        keys::ACCOUNT_TTL,
        || async {
            let orders = Orders::find()
                .filter(OrderCol::UserId.eq(user_id))
                .order_by_desc(OrderCol::OrderDate)
                .limit(RECENT_ORDERS)
                .all(&state.orm)
                .await?
                .into_iter()
                .map(order_service::order_from_entity)
                .collect();
            Ok::<_, AppError>(orders)
        },
    )
    .await
}

/// Profile page data: the user, their latest orders and saved addresses.
pub async fn profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ProfileView>> {
    let profile = cache::get_or_compute(
        state.cache.as_ref(),
        &keys::account_profile(user.user_id),
        keys::ACCOUNT_TTL,
        || load_user(state, user.user_id),
    )
    .await?;
    let recent_orders = cached_recent_orders(state, user.user_id).await?;
    let addresses = cached_addresses(state, user.user_id).await?;

    Ok(ApiResponse::success(
        "OK",
        ProfileView {
            user: profile,
            recent_orders,
            addresses,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let changes = ProfileChanges::from_request(payload)?;

    if let Some(email) = changes.email.as_deref() {
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(email)
                .bind(user.user_id)
                .fetch_optional(&state.pool)
                .await?;
        if taken.is_some() {
            return Err(AppError::validation("Email is already taken"));
        }
    }

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            email = COALESCE($4, email),
            bio = COALESCE($5, bio)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(changes.first_name)
    .bind(changes.last_name)
    .bind(changes.email)
    .bind(changes.bio)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    cache::invalidate(state.cache.as_ref(), &[keys::account_profile(user.user_id)]).await;
    audit::record(
        &state.pool,
        user.user_id,
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Your profile has been updated successfully.",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = cached_addresses(state, user.user_id).await?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        AddressList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn add_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let new = NewAddress::from_request(&payload)?;

    let address: Address = sqlx::query_as(
        r#"
        INSERT INTO addresses (id, user_id, address, city, state, zip_code, phone_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(new.address)
    .bind(new.city)
    .bind(new.state)
    .bind(new.zip_code)
    .bind(new.phone_number)
    .fetch_one(&state.pool)
    .await?;

    cache::invalidate(state.cache.as_ref(), &[keys::account_addresses(user.user_id)]).await;

    Ok(ApiResponse::success(
        "Address added successfully.",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    cache::invalidate(state.cache.as_ref(), &[keys::account_addresses(user.user_id)]).await;

    Ok(ApiResponse::message_only("Address deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_changes_keep_absent_fields_untouched() {
        let changes = ProfileChanges::from_request(UpdateProfileRequest {
            first_name: Some("  Meera ".into()),
            last_name: None,
            email: Some("Meera@Example.com".into()),
            bio: Some(String::new()),
        })
        .unwrap();
        assert_eq!(
            changes,
            ProfileChanges {
                first_name: Some("Meera".into()),
                last_name: None,
                email: Some("meera@example.com".into()),
                bio: Some(String::new()),
            }
        );
    }

    #[test]
    fn overlong_bio_is_rejected() {
        let result = ProfileChanges::from_request(UpdateProfileRequest {
            first_name: None,
            last_name: None,
            email: None,
            bio: Some("x".repeat(501)),
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn address_requires_every_field() {
        let request = AddressRequest {
            address: "4 Beach Road".into(),
            city: "Goa".into(),
            state: " ".into(),
            zip_code: "403001".into(),
            phone_number: "9800000000".into(),
        };
        assert!(matches!(NewAddress::from_request(&request), Err(AppError::Validation(_))));
    }
}
