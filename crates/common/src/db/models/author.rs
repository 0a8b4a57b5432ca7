//! Author entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// De-duplication key; name variants are not normalized
    #[sea_orm(column_type = "Text", unique)]
    pub name: String,

    /// Defaults to "Unknown" when created by the resolver
    #[sea_orm(column_type = "Text", nullable)]
    pub affiliation: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::authorship::Entity")]
    Authorship,
}

impl Related<super::authorship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Authorship.def()
    }
}

impl Related<super::publication::Entity> for Entity {
    fn to() -> RelationDef {
        super::authorship::Relation::Publication.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::authorship::Relation::Author.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
