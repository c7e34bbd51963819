pub mod cache;
pub mod error;

pub use cache::{membership_cache_key, workspace_cache_prefix, Cache, CacheConfig};
pub use error::{CacheError, Result};
