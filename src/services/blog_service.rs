use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    cache::{self, keys},
    dto::blog::{BlogOverview, CategoryPosts, CategoryRequest, PostRequest},
    entity::{
        blog_categories::{
            ActiveModel as CategoryActive, Column as CategoryCol, Entity as BlogCategories,
            Model as CategoryModel,
        },
        blog_posts::{
            ActiveModel as PostActive, Column as PostCol, Entity as BlogPosts, Model as PostModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{BlogCategory, BlogPost},
    response::{ApiResponse, Meta},
    services::{optional_field, required_field},
    state::AppState,
};

const LATEST_POSTS: u64 = 3;

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn slug_field(value: &str, max_len: usize) -> AppResult<String> {
    let slug = required_field("slug", value, max_len)?;
    if !is_valid_slug(&slug) {
        return Err(AppError::validation(
            "slug may only contain lowercase letters, digits and hyphens",
        ));
    }
    Ok(slug)
}

struct PostInput {
    title: String,
    slug: String,
    category_id: Uuid,
    content: String,
    excerpt: String,
    publish_date: Option<chrono::DateTime<Utc>>,
    is_featured: bool,
}

impl PostInput {
    fn from_request(payload: PostRequest) -> AppResult<Self> {
        Ok(Self {
            title: required_field("title", &payload.title, 200)?,
            slug: slug_field(&payload.slug, 200)?,
            category_id: payload.category_id,
            content: required_field("content", &payload.content, usize::MAX)?,
            excerpt: optional_field("excerpt", &payload.excerpt, 300)?,
            publish_date: payload.publish_date,
            is_featured: payload.is_featured,
        })
    }
}

fn post_from_entity(model: PostModel) -> BlogPost {
    BlogPost {
        id: model.id,
        title: model.title,
        slug: model.slug,
        category_id: model.category_id,
        author_id: model.author_id,
        content: model.content,
        excerpt: model.excerpt,
        publish_date: model.publish_date.with_timezone(&Utc),
        is_featured: model.is_featured,
    }
}

fn category_from_entity(model: CategoryModel) -> BlogCategory {
    BlogCategory {
        id: model.id,
        name: model.name,
        slug: model.slug,
    }
}

async fn featured_post(state: &AppState) -> AppResult<Option<BlogPost>> {
    cache::get_or_compute(
        state.cache.as_ref(),
        keys::BLOG_FEATURED_POST,
        keys::BLOG_MEDIUM_TTL,
        || async {
            let post = BlogPosts::find()
                .filter(PostCol::IsFeatured.eq(true))
                .order_by_desc(PostCol::PublishDate)
                .one(&state.orm)
                .await?;
            Ok::<_, AppError>(post.map(post_from_entity))
        },
    )
    .await
}

async fn latest_posts(state: &AppState) -> AppResult<Vec<BlogPost>> {
    cache::get_or_compute(
        state.cache.as_ref(),
        keys::BLOG_LATEST_POSTS,
        keys::BLOG_SHORT_TTL,
        || async {
            let posts = BlogPosts::find()
                .filter(PostCol::IsFeatured.eq(false))
                .order_by_desc(PostCol::PublishDate)
                .limit(LATEST_POSTS)
                .all(&state.orm)
                .await?;
            Ok::<_, AppError>(posts.into_iter().map(post_from_entity).collect())
        },
    )
    .await
}

async fn categories(state: &AppState) -> AppResult<Vec<BlogCategory>> {
    cache::get_or_compute(
        state.cache.as_ref(),
        keys::BLOG_CATEGORIES,
        keys::BLOG_MEDIUM_TTL,
        || async {
            let categories = BlogCategories::find()
                .order_by_asc(CategoryCol::Name)
                .all(&state.orm)
                .await?;
            Ok::<_, AppError>(categories.into_iter().map(category_from_entity).collect())
        },
    )
    .await
}

pub async fn overview(state: &AppState) -> AppResult<ApiResponse<BlogOverview>> {
    let data = BlogOverview {
        featured_post: featured_post(state).await?,
        latest_posts: latest_posts(state).await?,
        categories: categories(state).await?,
    };
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn get_post(state: &AppState, id: Uuid) -> AppResult<ApiResponse<BlogPost>> {
    let post = cache::get_or_compute(
        state.cache.as_ref(),
        &keys::blog_post(id),
        keys::BLOG_SHORT_TTL,
        || async {
            BlogPosts::find_by_id(id)
                .one(&state.orm)
                .await?
                .map(post_from_entity)
                .ok_or(AppError::NotFound)
        },
    )
    .await?;
    Ok(ApiResponse::success("OK", post, Some(Meta::empty())))
}

pub async fn category_posts(state: &AppState, slug: &str) -> AppResult<ApiResponse<CategoryPosts>> {
    let data = cache::get_or_compute(
        state.cache.as_ref(),
        &keys::blog_category_posts(slug),
        keys::BLOG_SHORT_TTL,
        || async {
            let category = BlogCategories::find()
                .filter(CategoryCol::Slug.eq(slug))
                .one(&state.orm)
                .await?
                .ok_or(AppError::NotFound)?;
            let posts = BlogPosts::find()
                .filter(PostCol::CategoryId.eq(category.id))
                .order_by_desc(PostCol::PublishDate)
                .all(&state.orm)
                .await?;
            Ok::<_, AppError>(CategoryPosts {
                category: category_from_entity(category),
                posts: posts.into_iter().map(post_from_entity).collect(),
            })
        },
    )
    .await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

async fn category_slug<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<String>> {
    Ok(BlogCategories::find_by_id(id).one(conn).await?.map(|c| c.slug))
}

/// At most one post is featured at a time. Returns the posts that lost the flag.
async fn unfeature_others(txn: &DatabaseTransaction, keep: Uuid) -> AppResult<Vec<Uuid>> {
    let previous: Vec<Uuid> = BlogPosts::find()
        .filter(PostCol::IsFeatured.eq(true))
        .filter(PostCol::Id.ne(keep))
        .lock(LockType::Update)
        .all(txn)
        .await?
        .into_iter()
        .map(|post| post.id)
        .collect();
    if !previous.is_empty() {
        BlogPosts::update_many()
            .col_expr(PostCol::IsFeatured, Expr::value(false))
            .filter(PostCol::Id.is_in(previous.clone()))
            .exec(txn)
            .await?;
    }
    Ok(previous)
}

/// Cache keys touched by a post write, plus category prefixes to clear.
fn post_write_keys(
    post_id: Uuid,
    featured_changed: bool,
    category_slugs: &[Option<String>],
) -> (Vec<String>, Vec<String>) {
    let mut stale = vec![keys::blog_post(post_id), keys::BLOG_LATEST_POSTS.to_string()];
    if featured_changed {
        stale.push(keys::BLOG_FEATURED_POST.to_string());
    }
    let mut prefixes: Vec<String> = category_slugs
        .iter()
        .flatten()
        .map(|slug| keys::blog_category_prefix(slug))
        .collect();
    prefixes.sort();
    prefixes.dedup();
    (stale, prefixes)
}

async fn apply_invalidation(state: &AppState, stale: Vec<String>, prefixes: Vec<String>) {
    cache::invalidate(state.cache.as_ref(), &stale).await;
    for prefix in prefixes {
        cache::invalidate_prefix(state.cache.as_ref(), &prefix).await;
    }
}

pub async fn create_post(
    state: &AppState,
    user: &AuthUser,
    payload: PostRequest,
) -> AppResult<ApiResponse<BlogPost>> {
    ensure_admin(user)?;
    let input = PostInput::from_request(payload)?;

    let txn = state.orm.begin().await?;
    let slug = category_slug(&txn, input.category_id)
        .await?
        .ok_or_else(|| AppError::validation("Unknown blog category"))?;

    let id = Uuid::new_v4();
    let unfeatured = if input.is_featured {
        unfeature_others(&txn, id).await?
    } else {
        Vec::new()
    };
    let post = PostActive {
        id: Set(id),
        title: Set(input.title),
        slug: Set(input.slug),
        category_id: Set(input.category_id),
        author_id: Set(user.user_id),
        content: Set(input.content),
        excerpt: Set(input.excerpt),
        publish_date: Set(input.publish_date.unwrap_or_else(Utc::now).into()),
        is_featured: Set(input.is_featured),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    let (mut stale, prefixes) = post_write_keys(post.id, post.is_featured, &[Some(slug)]);
    stale.extend(unfeatured.into_iter().map(keys::blog_post));
    apply_invalidation(state, stale, prefixes).await;
    audit::record(
        &state.pool,
        user.user_id,
        "blog_post_create",
        "blog_posts",
        serde_json::json!({ "post_id": post.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Post created",
        post_from_entity(post),
        Some(Meta::empty()),
    ))
}

pub async fn update_post(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: PostRequest,
) -> AppResult<ApiResponse<BlogPost>> {
    ensure_admin(user)?;
    let input = PostInput::from_request(payload)?;

    let txn = state.orm.begin().await?;
    let existing = BlogPosts::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let new_slug = category_slug(&txn, input.category_id)
        .await?
        .ok_or_else(|| AppError::validation("Unknown blog category"))?;
    let old_slug = if existing.category_id == input.category_id {
        None
    } else {
        category_slug(&txn, existing.category_id).await?
    };
    let was_featured = existing.is_featured;

    let unfeatured = if input.is_featured {
        unfeature_others(&txn, id).await?
    } else {
        Vec::new()
    };
    let mut active: PostActive = existing.into();
    active.title = Set(input.title);
    active.slug = Set(input.slug);
    active.category_id = Set(input.category_id);
    active.content = Set(input.content);
    active.excerpt = Set(input.excerpt);
    if let Some(date) = input.publish_date {
        active.publish_date = Set(date.into());
    }
    active.is_featured = Set(input.is_featured);
    let post = active.update(&txn).await?;
    txn.commit().await?;

    let (mut stale, prefixes) = post_write_keys(
        post.id,
        was_featured || post.is_featured,
        &[old_slug, Some(new_slug)],
    );
    stale.extend(unfeatured.into_iter().map(keys::blog_post));
    apply_invalidation(state, stale, prefixes).await;
    audit::record(
        &state.pool,
        user.user_id,
        "blog_post_update",
        "blog_posts",
        serde_json::json!({ "post_id": post.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Post updated",
        post_from_entity(post),
        Some(Meta::empty()),
    ))
}

pub async fn delete_post(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = BlogPosts::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let slug = category_slug(&txn, existing.category_id).await?;
    BlogPosts::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    let (stale, prefixes) = post_write_keys(id, existing.is_featured, &[slug]);
    apply_invalidation(state, stale, prefixes).await;
    audit::record(
        &state.pool,
        user.user_id,
        "blog_post_delete",
        "blog_posts",
        serde_json::json!({ "post_id": id }),
    )
    .await;

    Ok(ApiResponse::message_only("Post deleted"))
}

/// Create a category, or rename an existing one when `id` is given.
pub async fn upsert_category(
    state: &AppState,
    user: &AuthUser,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<BlogCategory>> {
    ensure_admin(user)?;
    let name = required_field("name", &payload.name, 100)?;
    let slug = slug_field(&payload.slug, 100)?;

    let txn = state.orm.begin().await?;
    let clash = BlogCategories::find()
        .filter(CategoryCol::Slug.eq(slug.as_str()))
        .one(&txn)
        .await?;
    if clash.is_some_and(|c| Some(c.id) != payload.id) {
        return Err(AppError::validation("Category slug is already in use"));
    }

    let (category, old_slug) = match payload.id {
        Some(id) => {
            let existing = BlogCategories::find_by_id(id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            let old_slug = existing.slug.clone();
            let mut active: CategoryActive = existing.into();
            active.name = Set(name);
            active.slug = Set(slug);
            (active.update(&txn).await?, Some(old_slug))
        }
        None => {
            let created = CategoryActive {
                id: Set(Uuid::new_v4()),
                name: Set(name),
                slug: Set(slug),
            }
            .insert(&txn)
            .await?;
            (created, None)
        }
    };
    txn.commit().await?;

    let mut prefixes = vec![keys::blog_category_prefix(&category.slug)];
    if let Some(old) = old_slug.filter(|old| *old != category.slug) {
        prefixes.push(keys::blog_category_prefix(&old));
    }
    apply_invalidation(state, vec![keys::BLOG_CATEGORIES.to_string()], prefixes).await;
    audit::record(
        &state.pool,
        user.user_id,
        "blog_category_upsert",
        "blog_categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category saved",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}
