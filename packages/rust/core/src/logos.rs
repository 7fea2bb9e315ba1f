//! Token logo URIs: normalization to `ipfs://` form and optional mirroring
//! to our own content store.

use tracing::{debug, info, instrument, warn};

use tokenlist_shared::TokenRecord;
use tokenlist_storage::Storage;

use crate::publisher::Publisher;
use crate::sources::BlobSource;

const IPFS_SCHEME: &str = "ipfs://";

/// Canonical form of a registry logo reference, or `None` when it is empty or
/// not something a wallet could load.
///
/// `/ipfs/<cid>/...` paths and bare CIDs become `ipfs://` URIs; `ipfs://`
/// and `http(s)://` URIs pass through.
pub fn normalize_logo_uri(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with(IPFS_SCHEME) || raw.starts_with("https://") || raw.starts_with("http://") {
        return Some(raw.to_string());
    }
    if let Some(path) = raw.strip_prefix("/ipfs/") {
        return (!path.is_empty()).then(|| format!("{IPFS_SCHEME}{path}"));
    }
    if looks_like_cid(raw) {
        return Some(format!("{IPFS_SCHEME}{raw}"));
    }
    None
}

fn looks_like_cid(raw: &str) -> bool {
    let cid = raw.split('/').next().unwrap_or_default();
    let v0 = cid.len() == 46 && cid.starts_with("Qm");
    let v1 = cid.len() > 50 && cid.starts_with("bafy");
    (v0 || v1) && cid.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Normalize every token's logo in place. Returns how many were dropped.
pub fn normalize_logos(tokens: &mut [TokenRecord]) -> usize {
    let mut dropped = 0;
    for token in tokens.iter_mut() {
        let Some(raw) = token.logo_uri.take() else {
            continue;
        };
        token.logo_uri = normalize_logo_uri(&raw);
        if token.logo_uri.is_none() {
            warn!(token = %token.key(), logo = %raw, "unrecognized logo reference dropped");
            dropped += 1;
        }
    }
    dropped
}

/// Outcome of a mirroring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub uploaded: usize,
    pub cached: usize,
    pub failed: usize,
}

/// A logo already pointing at its mirrored id, not stored yet.
#[derive(Debug)]
struct PendingLogo {
    index: usize,
    cache_key: String,
    file_name: String,
    original: String,
    predicted: String,
    bytes: Vec<u8>,
}

/// Mirrored URIs decided before the version gate, and the uploads they
/// still need.
#[derive(Debug, Default)]
pub struct MirrorPlan {
    pending: Vec<PendingLogo>,
    pub stats: MirrorStats,
}

impl MirrorPlan {
    /// Logos waiting for [`LogoMirror::commit`].
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Re-uploads `ipfs://` logos through the publisher's channels.
///
/// Mirroring runs in two steps so that a run which publishes nothing stores
/// nothing. [`plan`](Self::plan) rewrites URIs using the upload cache
/// (`<checksum address>-<cid>`) or an id computed from the logo bytes;
/// [`commit`](Self::commit) performs the uploads once publishing is certain.
pub struct LogoMirror<'a> {
    blobs: &'a dyn BlobSource,
    publisher: &'a Publisher<'a>,
    cache: Option<&'a Storage>,
}

impl<'a> LogoMirror<'a> {
    pub fn new(
        blobs: &'a dyn BlobSource,
        publisher: &'a Publisher<'a>,
        cache: Option<&'a Storage>,
    ) -> Self {
        Self {
            blobs,
            publisher,
            cache,
        }
    }

    /// Point each token's logo at its mirrored copy without storing
    /// anything. A logo that cannot be read or whose id cannot be computed
    /// keeps its current URI.
    #[instrument(skip_all, fields(tokens = tokens.len()))]
    pub async fn plan(&self, tokens: &mut [TokenRecord]) -> MirrorPlan {
        let mut plan = MirrorPlan::default();

        for (index, token) in tokens.iter_mut().enumerate() {
            let Some(path) = token
                .logo_uri
                .as_deref()
                .and_then(|uri| uri.strip_prefix(IPFS_SCHEME))
                .map(str::to_string)
            else {
                continue;
            };
            let fragment = path.split('/').next().unwrap_or_default();
            let cache_key = format!("{}-{fragment}", token.address.to_checksum(None));

            if let Some(content_id) = self.lookup(&cache_key).await {
                token.logo_uri = Some(format!("{IPFS_SCHEME}{content_id}"));
                plan.stats.cached += 1;
                continue;
            }

            let bytes = match self.blobs.fetch_blob(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(token = %token.key(), error = %e, "logo unreadable, keeping original");
                    plan.stats.failed += 1;
                    continue;
                }
            };
            let Some(predicted) = self.publisher.content_id(&bytes) else {
                warn!(token = %token.key(), size = bytes.len(), "mirrored id unknown, keeping original");
                plan.stats.failed += 1;
                continue;
            };

            debug!(token = %token.key(), %predicted, "logo mirror planned");
            let original = format!("{IPFS_SCHEME}{path}");
            token.logo_uri = Some(format!("{IPFS_SCHEME}{predicted}"));
            plan.pending.push(PendingLogo {
                index,
                cache_key,
                file_name: path.rsplit('/').next().unwrap_or(&path).to_string(),
                original,
                predicted,
                bytes,
            });
        }

        info!(
            cached = plan.stats.cached,
            pending = plan.pending.len(),
            failed = plan.stats.failed,
            "logo mirrors planned"
        );
        plan
    }

    /// Upload every logo `plan` pointed at. A stored id that differs from the
    /// planned one replaces it; a failed upload restores the source URI.
    #[instrument(skip_all, fields(pending = plan.pending.len()))]
    pub async fn commit(&self, plan: MirrorPlan, tokens: &mut [TokenRecord]) -> MirrorStats {
        let mut stats = plan.stats;

        for logo in plan.pending {
            let Some(token) = tokens.get_mut(logo.index) else {
                continue;
            };
            match self.publisher.upload(&logo.file_name, &logo.bytes).await {
                Ok((stored, _)) => {
                    self.remember(&logo.cache_key, &stored.content_id).await;
                    if stored.content_id != logo.predicted {
                        warn!(
                            token = %token.key(),
                            predicted = %logo.predicted,
                            stored = %stored.content_id,
                            "mirrored id differs from the planned one"
                        );
                        token.logo_uri = Some(format!("{IPFS_SCHEME}{}", stored.content_id));
                    }
                    stats.uploaded += 1;
                }
                Err(e) => {
                    warn!(token = %token.key(), error = %e, "logo upload failed, keeping original");
                    token.logo_uri = Some(logo.original);
                    stats.failed += 1;
                }
            }
        }

        info!(
            uploaded = stats.uploaded,
            cached = stats.cached,
            failed = stats.failed,
            "logos mirrored"
        );
        stats
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        let cache = self.cache?;
        match cache.cached_upload(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "upload cache lookup failed");
                None
            }
        }
    }

    async fn remember(&self, key: &str, content_id: &str) {
        let Some(cache) = self.cache else {
            return;
        };
        if let Err(e) = cache.remember_upload(key, content_id).await {
            warn!(error = %e, "upload cache write failed");
        }
    }
}
