//! Client-side data layer for the whisper wall: a keyed query cache with
//! explicit invalidation, mutation handlers that invalidate what they touch,
//! and the debounced search-history recorder.

pub mod binder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod like;
pub mod search;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use binder::{QueryBinder, QueryState, QueryStatus};
pub use cache::{QueryCache, QueryKey, QueryScope};
pub use client::WallClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::HttpStore;
pub use like::{LikeSubject, LikeToggle};
pub use search::SearchRecorder;
pub use session::Session;
pub use store::WallStore;
