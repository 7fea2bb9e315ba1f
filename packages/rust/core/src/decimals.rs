//! Tiered resolution of missing decimals.
//!
//! A record whose decimals are missing or hold the `0` sentinel goes through:
//! a direct `decimals()` call, an EIP-165 probe for NFT standards, and the
//! curated decimals registry. Whatever is still unresolved is dropped.

use alloy_primitives::Address;
use tracing::{debug, info, instrument, warn};

use tokenlist_chain::NFT_INTERFACES;
use tokenlist_shared::{CurateEntry, CurateStatus, NftStandard, TokenRecord};

use crate::pipeline::ProgressReporter;
use crate::sources::{ContractProbe, CurateRegistry};

/// Outcome of resolving a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `decimals()` answered (a legitimate `0` included).
    Direct(u8),
    /// The contract is an NFT; it leaves the fungible pipeline.
    Collectible(NftStandard),
    /// Taken from an eligible curated registry entry.
    Curated(u8),
    Unresolved,
}

/// Whether a curated registry entry may supply decimals: finally accepted, or
/// still unresolved but already crowdfunded or awaiting acceptance.
pub fn is_eligible(entry: &CurateEntry) -> bool {
    if entry.resolved {
        entry.status == CurateStatus::Accepted
    } else {
        matches!(
            entry.status,
            CurateStatus::Crowdfunded | CurateStatus::PendingAccept
        )
    }
}

/// Counters from a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub direct: usize,
    pub reclassified: usize,
    pub curated: usize,
    pub dropped: Vec<TokenRecord>,
}

pub struct DecimalsResolver<'a> {
    probe: &'a dyn ContractProbe,
    registry: Option<&'a dyn CurateRegistry>,
    /// Loaded on first use, at most once.
    curated: Option<Vec<CurateEntry>>,
}

impl<'a> DecimalsResolver<'a> {
    pub fn new(probe: &'a dyn ContractProbe, registry: Option<&'a dyn CurateRegistry>) -> Self {
        Self {
            probe,
            registry,
            curated: None,
        }
    }

    /// Run the stages for one token, stopping at the first that answers.
    pub async fn resolve(&mut self, token: Address) -> Resolution {
        match self.probe.decimals(token).await {
            Ok(decimals) => return Resolution::Direct(decimals),
            Err(e) => debug!(%token, error = %e, "decimals() unavailable"),
        }

        for (standard, interface_id) in NFT_INTERFACES {
            match self.probe.supports_interface(token, interface_id).await {
                Ok(true) => return Resolution::Collectible(standard),
                Ok(false) => {}
                Err(e) => debug!(%token, %standard, error = %e, "interface probe failed"),
            }
        }

        let curated = self.curated_entries().await;
        match curated
            .iter()
            .find(|entry| entry.address == token && is_eligible(entry))
        {
            Some(entry) => Resolution::Curated(entry.decimals),
            None => Resolution::Unresolved,
        }
    }

    async fn curated_entries(&mut self) -> &[CurateEntry] {
        if self.curated.is_none() {
            let entries = match self.registry {
                Some(registry) => match registry.items().await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(error = %e, "curated decimals registry unavailable");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            self.curated = Some(entries);
        }
        self.curated.as_deref().unwrap_or_default()
    }

    /// Resolve every record that needs it, sequentially and in order.
    /// Records that already carry decimals or a standard pass through.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn resolve_all(
        &mut self,
        records: Vec<TokenRecord>,
        progress: &dyn ProgressReporter,
    ) -> (Vec<TokenRecord>, ResolveStats) {
        let total = records.iter().filter(|r| r.needs_decimals()).count();
        let mut stats = ResolveStats::default();
        let mut out = Vec::with_capacity(records.len());
        let mut current = 0;

        for mut record in records {
            if !record.needs_decimals() {
                out.push(record);
                continue;
            }
            current += 1;
            progress.token_resolved(current, total);

            match self.resolve(record.address).await {
                Resolution::Direct(decimals) => {
                    stats.direct += 1;
                    record.set_decimals(decimals);
                }
                Resolution::Collectible(standard) => {
                    stats.reclassified += 1;
                    debug!(token = %record.key(), %standard, "reclassified as collectible");
                    record.reclassify(standard);
                }
                Resolution::Curated(decimals) => {
                    stats.curated += 1;
                    record.set_decimals(decimals);
                }
                Resolution::Unresolved => {
                    warn!(
                        token = %record.key(),
                        symbol = %record.symbol,
                        "could not resolve decimals, dropping token"
                    );
                    stats.dropped.push(record);
                    continue;
                }
            }
            out.push(record);
        }

        info!(
            direct = stats.direct,
            reclassified = stats.reclassified,
            curated = stats.curated,
            dropped = stats.dropped.len(),
            "decimals resolved"
        );
        (out, stats)
    }
}
