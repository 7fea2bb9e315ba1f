//! Token pre-filter and list schema validation.
//!
//! The pre-filter runs before versioning and decides which tokens are
//! eligible at all. [`validate_list`] runs on the assembled document and
//! collects every violation instead of stopping at the first.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use tracing::warn;
use url::Url;

use tokenlist_shared::{Result, TokenListError, TokenRecord, VersionedList};

const MAX_NAME_LEN: usize = 40;
const MAX_SYMBOL_LEN: usize = 20;
const MAX_LIST_NAME_LEN: usize = 20;
const MAX_KEYWORDS: usize = 20;
const MAX_KEYWORD_LEN: usize = 20;
const MAX_TAG_KEY_LEN: usize = 10;
const MAX_TAG_NAME_LEN: usize = 20;
const MAX_TAG_DESCRIPTION_LEN: usize = 200;
const MAX_TOKEN_TAGS: usize = 10;
const MAX_TOKENS: usize = 10_000;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ A-Za-z0-9_.'+\-%/À-ÖØ-öø-ÿ:&\[\]\(\)]+$").expect("valid regex")
});

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9+\-%/$.]+$").expect("valid regex"));

static WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ A-Za-z0-9_]+$").expect("valid regex"));

static TAG_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"));

static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ A-Za-z0-9_.,:]+$").expect("valid regex"));

fn len_within(value: &str, max: usize) -> bool {
    let n = value.chars().count();
    n >= 1 && n <= max
}

pub fn is_valid_name(name: &str) -> bool {
    len_within(name, MAX_NAME_LEN) && NAME_RE.is_match(name)
}

pub fn is_valid_symbol(symbol: &str) -> bool {
    len_within(symbol, MAX_SYMBOL_LEN) && SYMBOL_RE.is_match(symbol)
}

/// Split tokens into those with an acceptable name and symbol and the rest.
/// Both halves keep input order.
pub fn partition_valid(tokens: Vec<TokenRecord>) -> (Vec<TokenRecord>, Vec<TokenRecord>) {
    let (valid, invalid): (Vec<_>, Vec<_>) = tokens
        .into_iter()
        .partition(|t| is_valid_name(&t.name) && is_valid_symbol(&t.symbol));

    for token in &invalid {
        warn!(
            token = %token.key(),
            name = %token.name,
            symbol = %token.symbol,
            "token name or symbol rejected"
        );
    }
    (valid, invalid)
}

/// Check an assembled list against the token list schema.
///
/// Returns [`TokenListError::Schema`] carrying every violation found.
pub fn validate_list(list: &VersionedList) -> Result<()> {
    let mut errors = Vec::new();

    if !len_within(&list.name, MAX_LIST_NAME_LEN) || !WORDS_RE.is_match(&list.name) {
        errors.push(format!("name {:?} must be 1-20 word characters", list.name));
    }
    if DateTime::parse_from_rfc3339(&list.timestamp).is_err() {
        errors.push(format!("timestamp {:?} is not RFC 3339", list.timestamp));
    }
    if let Some(logo) = list.logo_uri.as_deref().filter(|l| Url::parse(l).is_err()) {
        errors.push(format!("logoURI {logo:?} is not a URI"));
    }

    if list.keywords.len() > MAX_KEYWORDS {
        errors.push(format!("{} keywords, at most {MAX_KEYWORDS} allowed", list.keywords.len()));
    }
    for keyword in &list.keywords {
        if !len_within(keyword, MAX_KEYWORD_LEN) || !WORDS_RE.is_match(keyword) {
            errors.push(format!("keyword {keyword:?} must be 1-20 word characters"));
        }
    }

    for (key, tag) in &list.tags {
        if key.chars().count() > MAX_TAG_KEY_LEN || !TAG_KEY_RE.is_match(key) {
            errors.push(format!("tag key {key:?} must be 1-10 word characters"));
        }
        if !len_within(&tag.name, MAX_TAG_NAME_LEN) || !WORDS_RE.is_match(&tag.name) {
            errors.push(format!("tags.{key}.name {:?} is invalid", tag.name));
        }
        if !len_within(&tag.description, MAX_TAG_DESCRIPTION_LEN)
            || !DESCRIPTION_RE.is_match(&tag.description)
        {
            errors.push(format!("tags.{key}.description is invalid"));
        }
    }

    if list.tokens.is_empty() || list.tokens.len() > MAX_TOKENS {
        errors.push(format!(
            "list has {} tokens, expected 1 to {MAX_TOKENS}",
            list.tokens.len()
        ));
    }

    let mut seen = HashSet::with_capacity(list.tokens.len());
    for (i, token) in list.tokens.iter().enumerate() {
        let at = format!("tokens[{i}]");
        if token.chain_id < 1 {
            errors.push(format!("{at}.chainId must be at least 1"));
        }
        if !is_valid_name(&token.name) {
            errors.push(format!("{at}.name {:?} is invalid", token.name));
        }
        if !is_valid_symbol(&token.symbol) {
            errors.push(format!("{at}.symbol {:?} is invalid", token.symbol));
        }
        match (token.decimals, token.standard) {
            (Some(_), None) | (None, Some(_)) => {}
            (Some(_), Some(_)) => errors.push(format!("{at} has both decimals and standard")),
            (None, None) => errors.push(format!("{at} has neither decimals nor standard")),
        }
        if let Some(logo) = token.logo_uri.as_deref().filter(|l| Url::parse(l).is_err()) {
            errors.push(format!("{at}.logoURI {logo:?} is not a URI"));
        }
        if token.tags.len() > MAX_TOKEN_TAGS {
            errors.push(format!("{at} has {} tags, at most {MAX_TOKEN_TAGS}", token.tags.len()));
        }
        for tag in &token.tags {
            if !list.tags.contains_key(tag) {
                errors.push(format!("{at} uses undefined tag {tag:?}"));
            }
        }
        if !seen.insert(token.key()) {
            errors.push(format!("{at} duplicates {}", token.key()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TokenListError::Schema { errors })
    }
}
