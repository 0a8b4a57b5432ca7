//! Publication entity
//!
//! `abstract` is dropped by the cleaning stage, so code that runs after
//! cleaning reads publications through explicit column lists rather than
//! through this entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Submitter, or the first listed author for enriched rows
    #[sea_orm(column_type = "Text", nullable)]
    pub submitter: Option<String>,

    /// Conflict target for enrichment upserts
    #[sea_orm(column_type = "Text", unique)]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    /// Journal reference, or the result link for enriched rows
    #[sea_orm(column_type = "Text", nullable)]
    pub journal_ref: Option<String>,

    /// Conflict target for the initial load
    #[sea_orm(column_type = "Text", nullable, unique)]
    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub report_no: Option<String>,

    /// Space separated category codes
    #[sea_orm(column_type = "Text", nullable)]
    pub categories: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub license: Option<String>,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    pub update_date: Option<Date>,

    #[sea_orm(column_type = "Text", nullable)]
    pub publication_type: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::authorship::Entity")]
    Authorship,

    #[sea_orm(has_many = "super::publication_category::Entity")]
    PublicationCategory,

    #[sea_orm(has_many = "super::citation::Entity")]
    Citations,
}

impl Related<super::authorship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Authorship.def()
    }
}

impl Related<super::publication_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PublicationCategory.def()
    }
}

impl Related<super::citation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Citations.def()
    }
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        super::authorship::Relation::Author.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::authorship::Relation::Publication.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
