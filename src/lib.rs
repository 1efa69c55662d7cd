pub mod cache;
pub mod config;
pub mod controller;
pub mod feed;
pub mod models;
pub mod observer;
pub mod parsers;
pub mod queue;
pub mod storage;
pub mod utils;

pub use cache::DecisionCache;
pub use config::Config;
pub use controller::{CardOutcome, ScanController, ScanSummary};
pub use feed::{Feed, HtmlFeed, MutationBatch};
pub use queue::FetchQueue;
