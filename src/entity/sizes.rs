use sea_orm::entity::prelude::*;

pub const MIN_SIZE: i32 = 4;
pub const MAX_SIZE: i32 = 12;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: i32,
}

/// Display name for a size code.
pub fn label(code: i32) -> String {
    format!("Size {code}")
}

pub fn is_valid_code(code: i32) -> bool {
    (MIN_SIZE..=MAX_SIZE).contains(&code)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_variants::Entity")]
    ProductVariants,
}

impl Related<super::product_variants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
