//! SeaORM entity models
//!
//! Entities for the publication store

mod author;
mod authorship;
mod category;
mod citation;
mod publication;
mod publication_category;

pub use publication::{
    Entity as PublicationEntity,
    Model as Publication,
    ActiveModel as PublicationActiveModel,
    Column as PublicationColumn,
};

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
};

pub use category::{
    Entity as CategoryEntity,
    Model as Category,
    ActiveModel as CategoryActiveModel,
    Column as CategoryColumn,
};

pub use authorship::{
    Entity as AuthorshipEntity,
    Model as Authorship,
    ActiveModel as AuthorshipActiveModel,
    Column as AuthorshipColumn,
};

pub use publication_category::{
    Entity as PublicationCategoryEntity,
    Model as PublicationCategory,
    ActiveModel as PublicationCategoryActiveModel,
    Column as PublicationCategoryColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};
