//! Feed retrieval: fetching RSS/Atom documents and normalizing their entries.
//!
//! The module is organized into three submodules:
//!
//! - [`identity`] - stable dedup keys derived from an entry's guid or link
//! - [`parser`] - feed parsing using the `feed-rs` crate
//! - [`fetcher`] - single-attempt HTTP retrieval with timeout and size caps
//!
//! Fetch and parse failures are scoped to one site per cycle; the delivery
//! engine records them and carries on with the remaining sites.

mod fetcher;
mod identity;
mod parser;

pub use fetcher::{fetch_articles, FetchError};
pub use identity::identify;
pub use parser::parse_feed;
