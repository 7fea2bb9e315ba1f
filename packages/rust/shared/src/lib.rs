//! Shared types, error model, and configuration for the token list pipeline.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`TokenListError`]: the unified error type
//! - Domain types ([`TokenRecord`], [`VersionedList`], [`Version`], [`CurateEntry`])
//! - Configuration ([`AppConfig`] and its sections, config loading and validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackoffKind, BadgeConfig, CacheConfig, ChainConfig, CurateConfig, EnsConfig,
    ListConfig, PublishConfig, RetryConfig, RunMode, cache_path, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_secret, validate_config,
};
pub use error::{Result, TokenListError};
pub use types::{
    CurateEntry, CurateStatus, NftStandard, TagDefinition, TokenKey, TokenRecord, Version,
    VersionedList, ZERO_ADDRESS, checksum, format_timestamp,
};
