use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{BlogCategory, BlogPost};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlogOverview {
    pub featured_post: Option<BlogPost>,
    pub latest_posts: Vec<BlogPost>,
    pub categories: Vec<BlogCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryPosts {
    pub category: BlogCategory,
    pub posts: Vec<BlogPost>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostRequest {
    pub title: String,
    pub slug: String,
    pub category_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    /// Existing category to rename; omitted to create a new one.
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
}
