use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "colors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(unique)]
    pub name: String,
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

/// Accepts `#RGB` and `#RRGGBB` hex codes.
pub fn is_valid_hex_code(code: &str) -> bool {
    let Some(hex) = code.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::is_valid_hex_code;

    #[test]
    fn hex_codes() {
        assert!(is_valid_hex_code("#FF0000"));
        assert!(is_valid_hex_code("#abc"));
        assert!(!is_valid_hex_code("FF0000"));
        assert!(!is_valid_hex_code("#FF00"));
        assert!(!is_valid_hex_code("#GG0000"));
    }
}
