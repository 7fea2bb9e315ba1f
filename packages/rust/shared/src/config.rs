//! Application configuration for the token list pipeline.
//!
//! User config lives at `~/.tokenlist/tokenlist.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: it names the environment variables holding them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TokenListError};
use crate::types::TagDefinition;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tokenlist.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tokenlist";

/// Default cache database file name inside the config directory.
const CACHE_FILE_NAME: &str = "tokenlist.db";

// ---------------------------------------------------------------------------
// Config structs (matching tokenlist.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chain and registry contracts.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Badge registries, in tag merge order.
    #[serde(default = "default_badges")]
    pub badges: Vec<BadgeConfig>,

    /// Curated decimals registry.
    #[serde(default)]
    pub curate: CurateConfig,

    /// Published list identity and output.
    #[serde(default)]
    pub list: ListConfig,

    /// Upload and pinning channels.
    #[serde(default)]
    pub publish: PublishConfig,

    /// ENS pointer update.
    #[serde(default)]
    pub ens: EnsConfig,

    /// Local upload cache and publication history.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            badges: default_badges(),
            curate: CurateConfig::default(),
            list: ListConfig::default(),
            publish: PublishConfig::default(),
            ens: EnsConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// `[chain]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Chain id stamped on every token record.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Tokens view contract used for batched T2CR reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_view_address: Option<Address>,

    /// The T2CR registry contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t2cr_address: Option<Address>,

    /// Tokens requested per view-contract page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Per-request timeout for RPC calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            chain_id: default_chain_id(),
            tokens_view_address: None,
            t2cr_address: None,
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider_url() -> String {
    "http://localhost:8545".into()
}
fn default_chain_id() -> u64 {
    1
}
fn default_page_size() -> u64 {
    300
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[[badges]]` entry: one badge registry and the tag it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeConfig {
    /// Tag key written into token `tags`.
    pub key: String,
    /// Display name for the list's `tags` map.
    pub name: String,
    /// Description for the list's `tags` map.
    pub description: String,
    /// Badge contract. Without one, the tag is only defined, never granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl BadgeConfig {
    pub fn definition(&self) -> TagDefinition {
        TagDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

fn default_badges() -> Vec<BadgeConfig> {
    let badge = |key: &str, name: &str, description: &str| BadgeConfig {
        key: key.into(),
        name: name.into(),
        description: description.into(),
        address: None,
    };
    vec![
        badge(
            "erc20",
            "ERC20",
            "This token is verified to be ERC20 thus there should not be incompatibility issues with the Uniswap protocol.",
        ),
        badge(
            "stablecoin",
            "Stablecoin",
            "This token is verified to maintain peg against a target.",
        ),
        badge(
            "trueCrypto",
            "TrueCrypto",
            "TrueCryptosystem verifies the token is a necessary element of a self sustaining public utility.",
        ),
        badge(
            "dutchX",
            "DutchX",
            "This token is verified to comply with the DutchX exchange listing criteria.",
        ),
    ]
}

/// `[curate]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurateConfig {
    /// Subgraph indexing the decimals registry. Unset disables the fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph_url: Option<String>,

    /// Registry contract whose items are queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_address: Option<Address>,
}

/// `[list]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    /// Short list name; published as `Kleros <name>`.
    #[serde(default = "default_list_name")]
    pub name: String,

    /// URL (or local path) of the currently published list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_list_url: Option<String>,

    /// File name given to the content store.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Also write the published document here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// List logo.
    #[serde(default = "default_list_logo")]
    pub logo_uri: String,

    /// List keywords.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Re-upload token logos to the content store.
    #[serde(default)]
    pub mirror_logos: bool,

    /// Gateway logos are downloaded from when mirroring.
    #[serde(default = "default_ipfs_gateway")]
    pub logo_gateway: String,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            name: default_list_name(),
            latest_list_url: None,
            file_name: default_file_name(),
            output_path: None,
            logo_uri: default_list_logo(),
            keywords: default_keywords(),
            mirror_logos: false,
            logo_gateway: default_ipfs_gateway(),
        }
    }
}

fn default_list_name() -> String {
    "T2CR".into()
}
fn default_file_name() -> String {
    "t2cr.tokenlist.json".into()
}
fn default_list_logo() -> String {
    "ipfs://QmRYXpD8X4sQZwA1E4SJvEjVZpEK1WtSrTqzTWvGpZVDwa".into()
}
fn default_keywords() -> Vec<String> {
    vec!["t2cr".into(), "kleros".into(), "list".into()]
}
fn default_ipfs_gateway() -> String {
    "https://ipfs.kleros.io".into()
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Primary upload channel (`POST {gateway}/add`).
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,

    /// Secondary upload channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estuary_base_url: Option<String>,

    /// Env var holding the Estuary bearer token.
    #[serde(default = "default_estuary_key_env")]
    pub estuary_api_key_env: String,

    /// Pinning service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinata_url: Option<String>,

    /// Env var holding the Pinata API key.
    #[serde(default = "default_pinata_key_env")]
    pub pinata_api_key_env: String,

    /// Env var holding the Pinata secret key.
    #[serde(default = "default_pinata_secret_env")]
    pub pinata_secret_api_key_env: String,

    /// Per-request timeout for upload calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry policy applied to every publish-side call.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: default_ipfs_gateway(),
            estuary_base_url: None,
            estuary_api_key_env: default_estuary_key_env(),
            pinata_url: None,
            pinata_api_key_env: default_pinata_key_env(),
            pinata_secret_api_key_env: default_pinata_secret_env(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_estuary_key_env() -> String {
    "ESTUARY_API_KEY".into()
}
fn default_pinata_key_env() -> String {
    "PINATA_API_KEY".into()
}
fn default_pinata_secret_env() -> String {
    "PINATA_SECRET_API_KEY".into()
}

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// `[publish.retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, first call included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: BackoffKind::Fixed,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_delay_ms() -> u64 {
    1000
}

/// `[ens]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsConfig {
    /// Update the ENS content hash after publishing.
    #[serde(default)]
    pub enabled: bool,

    /// ENS registry contract.
    #[serde(default = "default_ens_registry")]
    pub registry_address: Address,

    /// Name whose content hash points at the list (e.g. `t2crtokens.eth`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,

    /// Env var holding the hex private key of the name's manager. The
    /// update is signed locally and sent as a raw transaction.
    #[serde(default = "default_wallet_key_env")]
    pub wallet_key_env: String,
}

impl Default for EnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registry_address: default_ens_registry(),
            list_name: None,
            wallet_key_env: default_wallet_key_env(),
        }
    }
}

fn default_wallet_key_env() -> String {
    "WALLET_KEY".into()
}

fn default_ens_registry() -> Address {
    Address::new([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x2e, 0x07, 0x4e, 0xc6, 0x9a, 0x0d, 0xfb, 0x29, 0x97,
        0xba, 0x6c, 0x7d, 0x2e, 0x1e,
    ])
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Database path. Defaults to `~/.tokenlist/tokenlist.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Skip the cache and history entirely.
    #[serde(default)]
    pub disabled: bool,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tokenlist/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TokenListError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tokenlist/tokenlist.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the cache database path from config, falling back to the config dir.
pub fn cache_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.cache.path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join(CACHE_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TokenListError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TokenListError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TokenListError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TokenListError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TokenListError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the environment variable named by the config.
pub fn resolve_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(TokenListError::config(format!(
            "secret not found. Set the {var_name} environment variable."
        ))),
    }
}

/// What a run is about to do, for [`validate_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Build and validate only.
    DryRun,
    /// First publication, with no previous list.
    Initial,
    /// Publish a new version of an existing list.
    Update,
}

/// Validate everything a run in `mode` needs, once, before any network call.
pub fn validate_config(config: &AppConfig, mode: RunMode) -> Result<()> {
    check_url("chain.provider_url", &config.chain.provider_url)?;
    if config.chain.tokens_view_address.is_none() {
        return Err(TokenListError::config(
            "chain.tokens_view_address is not set",
        ));
    }
    if config.chain.t2cr_address.is_none() {
        return Err(TokenListError::config("chain.t2cr_address is not set"));
    }
    if config.chain.page_size == 0 {
        return Err(TokenListError::config("chain.page_size must be positive"));
    }

    let mut keys = HashSet::new();
    for badge in &config.badges {
        if badge.key.is_empty() || !badge.key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(TokenListError::config(format!(
                "badge key {:?} must be a non-empty word",
                badge.key
            )));
        }
        if !keys.insert(badge.key.as_str()) {
            return Err(TokenListError::config(format!(
                "duplicate badge key {:?}",
                badge.key
            )));
        }
    }

    if let Some(url) = &config.curate.subgraph_url {
        check_url("curate.subgraph_url", url)?;
        if config.curate.registry_address.is_none() {
            return Err(TokenListError::config(
                "curate.registry_address is required with curate.subgraph_url",
            ));
        }
    }

    check_url("publish.ipfs_gateway", &config.publish.ipfs_gateway)?;
    if config.publish.retry.max_attempts == 0 {
        return Err(TokenListError::config(
            "publish.retry.max_attempts must be at least 1",
        ));
    }
    if let Some(url) = &config.publish.estuary_base_url {
        check_url("publish.estuary_base_url", url)?;
        resolve_secret(&config.publish.estuary_api_key_env)?;
    }
    if let Some(url) = &config.publish.pinata_url {
        check_url("publish.pinata_url", url)?;
        resolve_secret(&config.publish.pinata_api_key_env)?;
        resolve_secret(&config.publish.pinata_secret_api_key_env)?;
    }

    if mode == RunMode::Update && config.list.latest_list_url.is_none() {
        return Err(TokenListError::config(
            "list.latest_list_url is required to publish an update (use an initial run for the first publication)",
        ));
    }

    if config.list.mirror_logos {
        check_url("list.logo_gateway", &config.list.logo_gateway)?;
    }

    if config.ens.enabled {
        if config.ens.list_name.as_deref().unwrap_or("").is_empty() {
            return Err(TokenListError::config(
                "ens.list_name is required when ens.enabled = true",
            ));
        }
        if mode != RunMode::DryRun {
            resolve_secret(&config.ens.wallet_key_env)?;
        }
    }

    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| TokenListError::config(format!("{field} is not a valid URL ({value}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.chain.tokens_view_address = Some(Address::repeat_byte(0x11));
        config.chain.t2cr_address = Some(Address::repeat_byte(0x22));
        config
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("provider_url"));
        assert!(toml_str.contains("PINATA_API_KEY"));
        assert!(toml_str.contains("stablecoin"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chain.page_size, 300);
        assert_eq!(parsed.publish.retry.max_attempts, 5);
        assert_eq!(parsed.badges.len(), 4);
        assert_eq!(parsed.ens.registry_address, default_ens_registry());
    }

    #[test]
    fn config_with_badges() {
        let toml_str = r#"
[chain]
provider_url = "https://rpc.example.com"
tokens_view_address = "0xf9b9b5440340123b21bff1ddafe1ad6feb9d6e7f"
t2cr_address = "0xebcf3bca271b26ae4b162ba560e243055af0e679"

[[badges]]
key = "stablecoin"
name = "Stablecoin"
description = "Pegged."
address = "0x78895ec026aeff2db73bc30e623c39e1c69b1386"

[publish.retry]
max_attempts = 10
backoff = "exponential"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.badges.len(), 1);
        assert!(config.badges[0].address.is_some());
        assert_eq!(config.publish.retry.max_attempts, 10);
        assert_eq!(config.publish.retry.backoff, BackoffKind::Exponential);
        assert!(validate_config(&config, RunMode::DryRun).is_ok());
    }

    #[test]
    fn validation_requires_contracts() {
        let config = AppConfig::default();
        let err = validate_config(&config, RunMode::DryRun).unwrap_err();
        assert!(err.to_string().contains("tokens_view_address"));
        assert!(validate_config(&runnable_config(), RunMode::DryRun).is_ok());
    }

    #[test]
    fn updates_require_the_published_list_location() {
        let mut config = runnable_config();
        let err = validate_config(&config, RunMode::Update).unwrap_err();
        assert!(err.to_string().contains("latest_list_url"));
        assert!(validate_config(&config, RunMode::Initial).is_ok());
        assert!(validate_config(&config, RunMode::DryRun).is_ok());

        config.list.latest_list_url = Some("https://t2crtokens.eth.link".into());
        assert!(validate_config(&config, RunMode::Update).is_ok());
    }

    #[test]
    fn validation_rejects_duplicate_badges() {
        let mut config = runnable_config();
        let dup = config.badges[0].clone();
        config.badges.push(dup);
        let err = validate_config(&config, RunMode::DryRun).unwrap_err();
        assert!(err.to_string().contains("duplicate badge key"));
    }

    #[test]
    fn publishing_requires_the_ens_wallet_key() {
        let mut config = runnable_config();
        config.ens.enabled = true;
        config.ens.list_name = Some("t2crtokens.eth".into());
        config.ens.wallet_key_env = "TOKENLIST_TEST_MISSING_WALLET_KEY".into();
        let err = validate_config(&config, RunMode::Initial).unwrap_err();
        assert!(err.to_string().contains("TOKENLIST_TEST_MISSING_WALLET_KEY"));
        assert!(validate_config(&config, RunMode::DryRun).is_ok());
    }

    #[test]
    fn missing_secret_is_reported() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_secret("TOKENLIST_TEST_NONEXISTENT_KEY_12345");
        assert!(result.unwrap_err().to_string().contains("TOKENLIST_TEST_NONEXISTENT_KEY_12345"));
    }

    #[test]
    fn badge_definition_copies_display_fields() {
        let config = AppConfig::default();
        let def = config.badges[1].definition();
        assert_eq!(def.name, "Stablecoin");
    }
}
