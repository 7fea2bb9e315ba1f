//! Semantic version of the next list, relative to the published one.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokenlist_shared::{Result, TokenKey, TokenRecord, Version, VersionedList};

/// What changed between the published tokens and the candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDiff {
    pub added: Vec<TokenKey>,
    pub changed: Vec<TokenKey>,
    pub removed: Vec<TokenKey>,
}

/// Version component a diff bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bump {
    None,
    Patch,
    Minor,
    Major,
}

impl Bump {
    /// Fails when the bumped component is already at its maximum.
    pub fn apply(self, version: Version) -> Result<Version> {
        match self {
            Self::None => Ok(version),
            Self::Patch => version.bump_patch(),
            Self::Minor => version.bump_minor(),
            Self::Major => version.bump_major(),
        }
    }
}

impl fmt::Display for Bump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        })
    }
}

impl TokenDiff {
    /// Removal beats addition, addition beats change.
    pub fn bump(&self) -> Bump {
        if !self.removed.is_empty() {
            Bump::Major
        } else if !self.added.is_empty() {
            Bump::Minor
        } else if !self.changed.is_empty() {
            Bump::Patch
        } else {
            Bump::None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bump() == Bump::None
    }
}

/// Compare candidates against the published tokens.
///
/// Tokens in `invalid` are ignored as candidates: they neither add nor change
/// anything, and a published token whose key is only found among them counts
/// as removed.
pub fn diff_tokens(
    previous: &[TokenRecord],
    candidates: &[TokenRecord],
    invalid: &[TokenRecord],
) -> TokenDiff {
    let excluded: HashSet<TokenKey> = invalid.iter().map(TokenRecord::key).collect();
    let published: HashMap<TokenKey, &TokenRecord> =
        previous.iter().map(|t| (t.key(), t)).collect();

    let mut diff = TokenDiff::default();
    let mut present = HashSet::with_capacity(candidates.len());

    for token in candidates {
        let key = token.key();
        if excluded.contains(&key) {
            continue;
        }
        present.insert(key);
        match published.get(&key) {
            None => diff.added.push(key),
            Some(prior) if *prior != token => diff.changed.push(key),
            Some(_) => {}
        }
    }

    diff.removed = previous
        .iter()
        .map(TokenRecord::key)
        .filter(|key| !present.contains(key))
        .collect();
    diff
}

/// Version the candidate list would be published under. `1.0.0` when
/// nothing was published before.
pub fn next_version(
    previous: Option<&VersionedList>,
    candidates: &[TokenRecord],
    invalid: &[TokenRecord],
) -> Result<Version> {
    match previous {
        None => Ok(Version::INITIAL),
        Some(list) => diff_tokens(&list.tokens, candidates, invalid)
            .bump()
            .apply(list.version),
    }
}
