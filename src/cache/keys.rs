//! Cache key layout and lifetimes.

use std::time::Duration;

use uuid::Uuid;

pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const CATALOG_TTL: Duration = Duration::from_secs(15 * 60);
pub const ACCOUNT_TTL: Duration = Duration::from_secs(5 * 60);
pub const BLOG_SHORT_TTL: Duration = HOUR;
pub const BLOG_MEDIUM_TTL: Duration = Duration::from_secs(6 * 60 * 60);

pub const CATALOG_CHOICES: &str = "catalog:choices";
pub const CATALOG_LIST_VERSION: &str = "catalog:list_version";
/// Every cached listing page, across versions. Does not cover the version key.
pub const CATALOG_LIST_PREFIX: &str = "catalog:list:";

pub const BLOG_FEATURED_POST: &str = "blog:featured_post";
pub const BLOG_LATEST_POSTS: &str = "blog:latest_posts";
pub const BLOG_CATEGORIES: &str = "blog:categories";

pub fn catalog_list(version: u64, fingerprint: &str) -> String {
    format!("{CATALOG_LIST_PREFIX}v{version}:{fingerprint}")
}

pub fn catalog_product(product_id: Uuid) -> String {
    format!("catalog:product:{product_id}")
}

pub fn account_profile(user_id: Uuid) -> String {
    format!("account:{user_id}:profile")
}

pub fn account_addresses(user_id: Uuid) -> String {
    format!("account:{user_id}:addresses")
}

pub fn account_recent_orders(user_id: Uuid) -> String {
    format!("account:{user_id}:recent_orders")
}

pub fn blog_post(post_id: Uuid) -> String {
    format!("blog:post:{post_id}")
}

/// Prefix covering every cached view of one category.
pub fn blog_category_prefix(slug: &str) -> String {
    format!("blog:category:{slug}:")
}

pub fn blog_category_posts(slug: &str) -> String {
    format!("{}posts", blog_category_prefix(slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_posts_key_is_under_category_prefix() {
        assert!(blog_category_posts("news").starts_with(&blog_category_prefix("news")));
        assert!(!blog_category_posts("news-2").starts_with(&blog_category_prefix("news")));
    }

    #[test]
    fn listing_keys_share_prefix_but_version_key_does_not() {
        assert!(catalog_list(7, "pg=1").starts_with(CATALOG_LIST_PREFIX));
        assert!(!CATALOG_LIST_VERSION.starts_with(CATALOG_LIST_PREFIX));
    }
}
