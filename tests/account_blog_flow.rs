mod common;

use std::sync::Arc;

use footwear_store_api::{
    dto::{
        account::{AddressRequest, UpdateProfileRequest},
        auth::{LoginResponse, OtpLoginRequest, OtpResendRequest, OtpVerifyRequest},
        blog::{CategoryRequest, PostRequest},
    },
    error::{AppError, AppResult},
    middleware::auth::decode_token,
    response::ApiResponse,
    services::{
        account_service,
        auth_service::{self, MAX_OTP_ATTEMPTS},
        blog_service,
    },
    state::AppState,
};
use uuid::Uuid;

use common::{RecordingOtpSender, create_user, setup_state, without_cache};

fn login(email: &str, username: Option<&str>) -> OtpLoginRequest {
    OtpLoginRequest {
        email: email.into(),
        username: username.map(Into::into),
    }
}

fn wrong_code(code: &str) -> &'static str {
    if code == "0000" { "0001" } else { "0000" }
}

async fn verify(
    state: &AppState,
    email: &str,
    otp: &str,
) -> AppResult<ApiResponse<LoginResponse>> {
    auth_service::verify_otp(
        state,
        OtpVerifyRequest {
            email: email.into(),
            otp: otp.into(),
        },
    )
    .await
}

fn post(title: &str, slug: &str, category_id: Uuid, is_featured: bool) -> PostRequest {
    PostRequest {
        title: title.into(),
        slug: slug.into(),
        category_id,
        content: format!("{title} body"),
        excerpt: String::new(),
        publish_date: None,
        is_featured,
    }
}

// OTP login, profile and addresses, then blog writes with cache invalidation.
#[tokio::test]
async fn accounts_and_blog_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let sender = Arc::new(RecordingOtpSender::default());
    let state = setup_state(&database_url, sender.clone()).await?;

    // Login codes are stored in the database, so login works with caching off.
    let uncached = without_cache(&state);

    // First login for an unknown e-mail needs a username.
    let missing_username =
        auth_service::request_otp(&uncached, login("meera@example.com", None)).await;
    assert!(matches!(missing_username, Err(AppError::Validation(_))));

    auth_service::request_otp(&uncached, login("Meera@Example.com", Some("meera"))).await?;
    let first_code = sender.last_code("meera@example.com").expect("code sent");

    auth_service::resend_otp(
        &uncached,
        OtpResendRequest {
            email: "meera@example.com".into(),
        },
    )
    .await?;
    let code = sender.last_code("meera@example.com").expect("code resent");

    let rejected = verify(&uncached, "meera@example.com", wrong_code(&code)).await;
    assert!(matches!(rejected, Err(AppError::Validation(msg)) if msg == "Invalid OTP"));
    if first_code != code {
        assert!(
            verify(&uncached, "meera@example.com", &first_code).await.is_err(),
            "a replaced code must not log in"
        );
    }

    let login_resp = verify(&uncached, "meera@example.com", &code).await?.data.expect("token");
    let user = decode_token(&login_resp.token, &state.auth.jwt_secret).expect("valid token");
    assert_eq!(user.role, "user");
    assert!(
        verify(&uncached, "meera@example.com", &code).await.is_err(),
        "codes are single use"
    );

    // Wrong guesses are counted; after the limit even the right code fails.
    auth_service::request_otp(&uncached, login("ravi@example.com", Some("ravi"))).await?;
    let ravi_code = sender.last_code("ravi@example.com").expect("code sent");
    for _ in 0..MAX_OTP_ATTEMPTS {
        assert!(verify(&uncached, "ravi@example.com", wrong_code(&ravi_code)).await.is_err());
    }
    assert!(verify(&uncached, "ravi@example.com", &ravi_code).await.is_err());

    // Two simultaneous logins with the same fresh code: only one gets a token.
    auth_service::request_otp(&uncached, login("ravi@example.com", None)).await?;
    let ravi_code = sender.last_code("ravi@example.com").expect("code sent");
    let (left, right) = tokio::join!(
        verify(&uncached, "ravi@example.com", &ravi_code),
        verify(&uncached, "ravi@example.com", &ravi_code),
    );
    assert_eq!([left.is_ok(), right.is_ok()].iter().filter(|ok| **ok).count(), 1);

    // Profile is cached; an update invalidates it.
    let profile = account_service::profile(&state, &user).await?.data.expect("profile");
    assert_eq!(profile.user.username, "meera");
    assert!(profile.recent_orders.is_empty());
    account_service::update_profile(
        &state,
        &user,
        UpdateProfileRequest {
            first_name: Some("Meera".into()),
            last_name: None,
            email: None,
            bio: Some("Runs on weekends".into()),
        },
    )
    .await?;
    let profile = account_service::profile(&state, &user).await?.data.expect("profile");
    assert_eq!(profile.user.first_name, "Meera");
    assert_eq!(profile.user.bio, "Runs on weekends");

    // Address writes invalidate the cached list.
    let listed = account_service::list_addresses(&state, &user).await?.data.expect("list");
    assert!(listed.items.is_empty());
    let address = account_service::add_address(
        &state,
        &user,
        AddressRequest {
            address: "4 Beach Road".into(),
            city: "Panaji".into(),
            state: "Goa".into(),
            zip_code: "403001".into(),
            phone_number: "9800000000".into(),
        },
    )
    .await?
    .data
    .expect("address");
    let listed = account_service::list_addresses(&state, &user).await?.data.expect("list");
    assert_eq!(listed.items.len(), 1);

    let stranger = create_user(&state, "stranger", "user").await?;
    assert!(matches!(
        account_service::delete_address(&state, &stranger, address.id).await,
        Err(AppError::NotFound)
    ));
    account_service::delete_address(&state, &user, address.id).await?;
    let listed = account_service::list_addresses(&state, &user).await?.data.expect("list");
    assert!(listed.items.is_empty());
    assert!(matches!(
        account_service::delete_address(&state, &user, address.id).await,
        Err(AppError::NotFound)
    ));

    // Blog writes are admin only and keep a single featured post.
    let admin = create_user(&state, "editor", "admin").await?;
    assert!(matches!(
        blog_service::upsert_category(
            &state,
            &user,
            CategoryRequest {
                id: None,
                name: "News".into(),
                slug: "news".into(),
            },
        )
        .await,
        Err(AppError::Forbidden)
    ));
    let news = blog_service::upsert_category(
        &state,
        &admin,
        CategoryRequest {
            id: None,
            name: "News".into(),
            slug: "news".into(),
        },
    )
    .await?
    .data
    .expect("category");

    let spring = post("Spring drop", "spring-drop", news.id, true);
    let first = blog_service::create_post(&state, &admin, spring)
        .await?
        .data
        .expect("post");
    let overview = blog_service::overview(&state).await?.data.expect("overview");
    assert_eq!(overview.featured_post.map(|p| p.id), Some(first.id));
    assert_eq!(overview.categories.len(), 1);

    let care = post("Care guide", "care-guide", news.id, true);
    let second = blog_service::create_post(&state, &admin, care)
        .await?
        .data
        .expect("post");
    let overview = blog_service::overview(&state).await?.data.expect("overview");
    assert_eq!(overview.featured_post.map(|p| p.id), Some(second.id));
    assert_eq!(overview.latest_posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first.id]);
    let first_now = blog_service::get_post(&state, first.id).await?.data.expect("post");
    assert!(!first_now.is_featured);

    // Renaming a category clears the cached listing under the old slug.
    let listing = blog_service::category_posts(&state, "news").await?.data.expect("posts");
    assert_eq!(listing.posts.len(), 2);
    blog_service::upsert_category(
        &state,
        &admin,
        CategoryRequest {
            id: Some(news.id),
            name: "Stories".into(),
            slug: "stories".into(),
        },
    )
    .await?;
    assert!(matches!(
        blog_service::category_posts(&state, "news").await,
        Err(AppError::NotFound)
    ));
    let renamed = blog_service::category_posts(&state, "stories").await?.data.expect("posts");
    assert_eq!(renamed.category.name, "Stories");

    blog_service::delete_post(&state, &admin, second.id).await?;
    assert!(matches!(
        blog_service::get_post(&state, second.id).await,
        Err(AppError::NotFound)
    ));
    let overview = blog_service::overview(&state).await?.data.expect("overview");
    assert!(overview.featured_post.is_none());

    Ok(())
}
