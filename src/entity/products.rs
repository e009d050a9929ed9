use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(5))")]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[sea_orm(string_value = "MEN")]
    Men,
    #[sea_orm(string_value = "WOMEN")]
    Women,
    #[sea_orm(string_value = "KIDS")]
    Kids,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Men => "Men's",
            Category::Women => "Women's",
            Category::Kids => "Kids'",
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(25))")]
pub enum ProductType {
    #[sea_orm(string_value = "SNEAKERS")]
    #[serde(rename = "SNEAKERS")]
    Sneakers,
    #[sea_orm(string_value = "BOOTS")]
    #[serde(rename = "BOOTS")]
    Boots,
    #[sea_orm(string_value = "SANDALS")]
    #[serde(rename = "SANDALS")]
    Sandals,
    #[sea_orm(string_value = "FLATSHOES")]
    #[serde(rename = "FLATSHOES")]
    FlatShoes,
    #[sea_orm(string_value = "CASUALSHOES")]
    #[serde(rename = "CASUALSHOES")]
    CasualShoes,
    #[sea_orm(string_value = "SLIPPERS_AND_FLIP_FLOPS")]
    #[serde(rename = "SLIPPERS_AND_FLIP_FLOPS")]
    SlippersAndFlipFlops,
    #[sea_orm(string_value = "UNIFORMSHOES")]
    #[serde(rename = "UNIFORMSHOES")]
    UniformShoes,
}

impl ProductType {
    pub fn label(self) -> &'static str {
        match self {
            ProductType::Sneakers => "Sneakers",
            ProductType::Boots => "Boots",
            ProductType::Sandals => "Sandals",
            ProductType::FlatShoes => "Flat Shoes",
            ProductType::CasualShoes => "Casual Shoes",
            ProductType::SlippersAndFlipFlops => "Slipper and Flip Flops",
            ProductType::UniformShoes => "Uniform Shoes",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub description: String,
    pub price: i64,
    pub category: Category,
    pub product_type: ProductType,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_variants::Entity")]
    ProductVariants,
    #[sea_orm(has_many = "super::product_images::Entity")]
    ProductImages,
}

impl Related<super::product_variants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariants.def()
    }
}

impl Related<super::product_images::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductImages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
