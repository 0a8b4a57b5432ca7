//! Category entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Category code such as `hep-ph`; de-duplication key
    #[sea_orm(column_type = "Text", unique)]
    pub category_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::publication_category::Entity")]
    PublicationCategory,
}

impl Related<super::publication_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PublicationCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
