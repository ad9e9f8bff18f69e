//! herald — polls RSS/Atom feeds and announces new articles to chat channels.
//!
//! The crate is split along the poll cycle:
//!
//! - [`feed`] - fetching and parsing feeds into normalized articles
//! - [`storage`] - the site registry and per-channel subscription state
//! - [`notify`] - message dispatch to the chat API
//! - [`engine`] - one fetch-deliver-collect cycle over all known sites
//! - [`scheduler`] - the interval loop driving cycles
//! - [`commands`] - the add/remove/list operations behind the CLI

pub mod commands;
pub mod config;
pub mod engine;
pub mod feed;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod util;
