mod schema;
mod sites;
mod subscriptions;
mod types;

pub use schema::Database;
pub use types::{Article, DatabaseError, ParsedArticle, Site};
