//! End-to-end run: registry → dedup → decimals → badges → pre-filter →
//! version gate → logo uploads → assemble → validate → publish.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use tokenlist_publish::{RetryPolicy, retry, write_list};
use tokenlist_shared::{BadgeConfig, Result, TokenListError, Version};
use tokenlist_storage::Storage;

use crate::assembler::{ListHeader, RenderedList, assemble, render};
use crate::badges::{apply_badges, fetch_badges};
use crate::decimals::DecimalsResolver;
use crate::dedup::dedup;
use crate::logos::{LogoMirror, MirrorPlan, MirrorStats, normalize_logos};
use crate::publisher::{PublishReceipt, Publisher};
use crate::sources::{
    BadgeSource, BlobSource, ContractProbe, CurateRegistry, PreviousListSource, TokenSource,
};
use crate::validation::{partition_valid, validate_list};
use crate::versioning::{Bump, TokenDiff, diff_tokens};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chain whose registry is read.
    pub chain_id: u64,
    pub header: ListHeader,
    /// File name handed to the content store.
    pub file_name: String,
    /// Badge registries, in tag merge order.
    pub badges: Vec<BadgeConfig>,
    /// Also write the document here.
    pub output_path: Option<PathBuf>,
    /// Build, validate and write the list, but publish nothing.
    pub dry_run: bool,
    /// First publication. The previous-list source must report nothing
    /// published. Otherwise a missing previous list fails any run but a dry one.
    pub initial: bool,
    /// Document timestamp. Injected so identical inputs give identical bytes.
    pub timestamp: String,
    pub mirror_logos: bool,
    /// Applied to the previous-list fetch. Publish calls use the publisher's own.
    pub retry: RetryPolicy,
}

/// Everything the pipeline reads from or writes to.
pub struct Adapters<'a> {
    pub tokens: &'a dyn TokenSource,
    pub probe: &'a dyn ContractProbe,
    pub curate: Option<&'a dyn CurateRegistry>,
    pub badges: &'a dyn BadgeSource,
    pub previous: &'a dyn PreviousListSource,
    /// Needed for logo mirroring only.
    pub blobs: Option<&'a dyn BlobSource>,
    pub publisher: &'a Publisher<'a>,
    /// Upload cache and publication history.
    pub storage: Option<&'a Storage>,
}

/// Counters collected along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub raw: usize,
    pub deduplicated: usize,
    pub logos_dropped: usize,
    pub direct: usize,
    pub reclassified: usize,
    pub curated: usize,
    pub unresolved: usize,
    pub badge_tags: usize,
    pub invalid: usize,
    pub mirror: MirrorStats,
    pub listed: usize,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The candidate list equals the published one; nothing was written.
    Unchanged,
    /// Built and validated, not published.
    DryRun { rendered: RenderedList },
    Published {
        rendered: RenderedList,
        receipt: PublishReceipt,
    },
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub previous_version: Option<Version>,
    pub version: Version,
    pub bump: Bump,
    pub diff: TokenDiff,
    pub stats: RunStats,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each token goes through decimals resolution.
    fn token_resolved(&self, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn token_resolved(&self, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Run the pipeline once.
///
/// Per-token failures (decimals, logos) never abort the run. Registry,
/// badge, schema and publish failures do, and nothing is published then.
#[instrument(skip_all, fields(chain_id = config.chain_id, list = %config.header.name, dry_run = config.dry_run))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    adapters: &Adapters<'_>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut stats = RunStats::default();

    // --- Phase 1: Registry ---
    progress.phase("Reading token registry");
    let raw = adapters.tokens.fetch_all(config.chain_id).await?;
    stats.raw = raw.len();
    let mut records = dedup(raw);
    stats.deduplicated = records.len();
    stats.logos_dropped = normalize_logos(&mut records);
    info!(raw = stats.raw, unique = stats.deduplicated, "registry read");

    // --- Phase 2: Decimals ---
    progress.phase("Resolving decimals");
    let mut resolver = DecimalsResolver::new(adapters.probe, adapters.curate);
    let (mut tokens, resolved) = resolver.resolve_all(records, progress).await;
    stats.direct = resolved.direct;
    stats.reclassified = resolved.reclassified;
    stats.curated = resolved.curated;
    stats.unresolved = resolved.dropped.len();

    // --- Phase 3: Badges ---
    progress.phase("Applying badges");
    let members = fetch_badges(adapters.badges, &config.badges).await?;
    stats.badge_tags = apply_badges(&mut tokens, &members);

    // --- Phase 4: Pre-filter ---
    let (mut valid, invalid) = partition_valid(tokens);
    stats.invalid = invalid.len();

    // Mirrored URIs are decided here so the diff sees them; nothing is
    // uploaded until the version gate has passed.
    let mirror = match (config.mirror_logos, adapters.blobs) {
        (true, Some(blobs)) => Some(LogoMirror::new(blobs, adapters.publisher, adapters.storage)),
        (true, None) => {
            warn!("logo mirroring enabled without a blob source");
            None
        }
        (false, _) => None,
    };
    let mut mirror_plan: Option<MirrorPlan> = None;
    if let Some(mirror) = &mirror {
        progress.phase("Planning logo mirrors");
        let plan = mirror.plan(&mut valid).await;
        stats.mirror = plan.stats;
        mirror_plan = Some(plan);
    }

    // --- Phase 5: Version gate ---
    progress.phase("Computing version");
    let previous = retry(&config.retry, "previous list", || adapters.previous.fetch()).await?;
    let previous_tokens = previous.as_ref().map(|l| l.tokens.as_slice()).unwrap_or_default();
    let diff = diff_tokens(previous_tokens, &valid, &invalid);
    let previous_version = previous.as_ref().map(|l| l.version);
    let (bump, version) = match previous_version {
        Some(prior) if config.initial => {
            return Err(TokenListError::validation(format!(
                "a list is already published at {prior}; an initial publication would regress it"
            )));
        }
        Some(prior) => (diff.bump(), diff.bump().apply(prior)?),
        None if config.initial || config.dry_run => (Bump::Major, Version::INITIAL),
        None => {
            return Err(TokenListError::validation(
                "no published list to version against; the first publication must be requested as initial",
            ));
        }
    };
    info!(
        previous = ?previous_version.map(|v| v.to_string()),
        next = %version,
        %bump,
        added = diff.added.len(),
        changed = diff.changed.len(),
        removed = diff.removed.len(),
        "version computed"
    );

    let mut report = RunReport {
        previous_version,
        version,
        bump,
        diff,
        stats,
        outcome: RunOutcome::Unchanged,
        elapsed: Duration::ZERO,
    };

    if previous_version == Some(version) {
        info!(%version, "list unchanged, nothing to publish");
        report.elapsed = start.elapsed();
        progress.done(&report);
        return Ok(report);
    }

    if let (Some(mirror), Some(plan)) = (&mirror, mirror_plan) {
        if config.dry_run {
            info!(pending = plan.pending(), "dry run, logo uploads skipped");
        } else {
            progress.phase("Mirroring logos");
            report.stats.mirror = mirror.commit(plan, &mut valid).await;
        }
    }

    // --- Phase 6: Assemble and validate ---
    progress.phase("Assembling list");
    let list = assemble(&config.header, version, &config.timestamp, valid);
    validate_list(&list)?;
    let rendered = render(&list)?;
    report.stats.listed = list.tokens.len();

    if let Some(path) = &config.output_path {
        write_list(path, &rendered.json)?;
        info!(path = %path.display(), "list written");
    }

    // --- Phase 7: Publish ---
    let content_id = if config.dry_run {
        info!(%version, sha256 = %rendered.sha256, "dry run, not publishing");
        report.outcome = RunOutcome::DryRun {
            rendered: rendered.clone(),
        };
        None
    } else {
        progress.phase("Publishing");
        let receipt = adapters
            .publisher
            .publish_list(&config.file_name, rendered.json.as_bytes())
            .await?;
        info!(%version, content_id = %receipt.content_id, channel = %receipt.channel, "list published");
        let content_id = receipt.content_id.clone();
        report.outcome = RunOutcome::Published {
            rendered: rendered.clone(),
            receipt,
        };
        Some(content_id)
    };

    if let Some(storage) = adapters.storage {
        let recorded = storage
            .record_publication(
                &config.header.name,
                version,
                content_id.as_deref(),
                &rendered.sha256,
                list.tokens.len(),
            )
            .await;
        if let Err(e) = recorded {
            warn!(error = %e, "failed to record publication history");
        }
    }

    report.elapsed = start.elapsed();
    progress.done(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeBadges, FakeBlobs, FakeCurate, FakeNames, FakePin, FakePrevious, FakeProbe,
        FakeStore, FakeTokens, token,
    };
    use alloy_primitives::Address;
    use tokenlist_chain::ERC721_INTERFACE_ID;
    use tokenlist_shared::{ListConfig, NftStandard, TokenRecord, VersionedList, ZERO_ADDRESS};

    const TIMESTAMP: &str = "2021-03-04T10:11:12.345Z";

    fn badge_config() -> Vec<BadgeConfig> {
        vec![BadgeConfig {
            key: "erc20".into(),
            name: "ERC20".into(),
            description: "Verified ERC20.".into(),
            address: Some(Address::repeat_byte(0xb1)),
        }]
    }

    fn config(dry_run: bool) -> PipelineConfig {
        let badges = badge_config();
        PipelineConfig {
            chain_id: 1,
            header: ListHeader::from_config(&ListConfig::default(), &badges),
            file_name: "t2cr.tokenlist.json".into(),
            badges,
            output_path: None,
            dry_run,
            initial: false,
            timestamp: TIMESTAMP.into(),
            mirror_logos: false,
            retry: RetryPolicy::NONE,
        }
    }

    fn initial_config() -> PipelineConfig {
        PipelineConfig {
            initial: true,
            ..config(false)
        }
    }

    fn base() -> Vec<TokenRecord> {
        vec![token(1, "USDC", Some(6)), token(2, "DAI", Some(18))]
    }

    struct Fixture {
        tokens: FakeTokens,
        probe: FakeProbe,
        curate: FakeCurate,
        badges: FakeBadges,
        previous: FakePrevious,
        store: FakeStore,
        pin: FakePin,
        names: FakeNames,
        blobs: FakeBlobs,
    }

    impl Fixture {
        fn new(records: Vec<TokenRecord>, previous: Option<VersionedList>) -> Self {
            Self {
                tokens: FakeTokens { records },
                probe: FakeProbe::default(),
                curate: FakeCurate::new(vec![]),
                badges: FakeBadges::default().with_badge(Address::repeat_byte(0xb1), &[1]),
                previous: FakePrevious(previous),
                store: FakeStore::new("Qm"),
                pin: FakePin::default(),
                names: FakeNames::default(),
                blobs: FakeBlobs::default(),
            }
        }

        async fn run(&self, config: &PipelineConfig) -> Result<RunReport> {
            self.run_with(config, None).await
        }

        async fn run_with(
            &self,
            config: &PipelineConfig,
            storage: Option<&Storage>,
        ) -> Result<RunReport> {
            let publisher = Publisher::new(RetryPolicy::NONE)
                .with_store("ipfs", &self.store)
                .with_pin(&self.pin)
                .with_name("t2crtokens.eth", &self.names);
            let adapters = Adapters {
                tokens: &self.tokens,
                probe: &self.probe,
                curate: Some(&self.curate),
                badges: &self.badges,
                previous: &self.previous,
                blobs: Some(&self.blobs),
                publisher: &publisher,
                storage,
            };
            run_pipeline(config, &adapters, &SilentProgress).await
        }
    }

    fn rendered(report: &RunReport) -> &RenderedList {
        match &report.outcome {
            RunOutcome::DryRun { rendered } | RunOutcome::Published { rendered, .. } => rendered,
            RunOutcome::Unchanged => panic!("run produced no document"),
        }
    }

    /// The list a first dry run over `records` would produce (version 1.0.0).
    async fn published(records: Vec<TokenRecord>) -> VersionedList {
        let report = Fixture::new(records, None).run(&config(true)).await.unwrap();
        VersionedList::from_json(&rendered(&report).json).unwrap()
    }

    #[tokio::test]
    async fn first_run_publishes_initial_version() {
        let fx = Fixture::new(base(), None);
        let report = fx.run(&initial_config()).await.unwrap();

        assert_eq!(report.version, Version::INITIAL);
        assert_eq!(report.previous_version, None);
        let RunOutcome::Published { receipt, rendered } = &report.outcome else {
            panic!("expected publication");
        };
        assert_eq!(receipt.content_id, "Qm1");
        assert!(receipt.pinned);
        assert_eq!(fx.store.upload_count(), 1);
        assert_eq!(
            fx.store.uploads.lock().unwrap()[0].1,
            rendered.json.as_bytes().to_vec()
        );
        assert_eq!(fx.names.pointers.lock().unwrap().len(), 1);

        let list = VersionedList::from_json(&rendered.json).unwrap();
        assert_eq!(list.name, "Kleros T2CR");
        assert_eq!(list.tokens[0].tags, vec!["erc20"]);
        assert!(list.tokens[1].tags.is_empty());
    }

    #[tokio::test]
    async fn unchanged_list_publishes_nothing() {
        let previous = published(base()).await;
        let fx = Fixture::new(base(), Some(previous));
        let report = fx.run(&config(false)).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Unchanged);
        assert_eq!(report.version, Version::INITIAL);
        assert_eq!(fx.store.upload_count(), 0);
        assert!(fx.pin.pinned.lock().unwrap().is_empty());
        assert!(fx.names.pointers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_previous_list_needs_initial_opt_in() {
        let fx = Fixture::new(base(), None);
        let err = fx.run(&config(false)).await.unwrap_err();
        assert!(matches!(err, TokenListError::Validation { .. }));
        assert_eq!(fx.store.upload_count(), 0);
        assert!(fx.names.pointers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn initial_publication_over_published_list_is_refused() {
        let previous = published(base()).await;
        let fx = Fixture::new(base(), Some(previous));
        let err = fx.run(&initial_config()).await.unwrap_err();
        assert!(err.to_string().contains("already published at 1.0.0"));
        assert_eq!(fx.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn maxed_previous_version_fails_before_publishing() {
        let mut previous = published(base()).await;
        previous.version = Version::new(1, 0, u32::MAX);
        let mut records = base();
        records[1].name = "Dai Stablecoin".into();
        let fx = Fixture::new(records, Some(previous));

        assert!(fx.run(&config(false)).await.is_err());
        assert_eq!(fx.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn unchanged_run_with_mirrored_logos_stores_nothing() {
        let mut records = base();
        records[0].logo_uri = Some("/ipfs/QmRYXpD8X4sQZwA1E4SJvEjVZpEK1WtSrTqzTWvGpZVDwa".into());
        let mut cfg = initial_config();
        cfg.mirror_logos = true;

        let mut first = Fixture::new(records.clone(), None);
        first.store = FakeStore::addressed("Qm");
        let report = first.run(&cfg).await.unwrap();
        assert_eq!(report.stats.mirror.uploaded, 1);
        assert_eq!(first.store.upload_count(), 2);
        let list = VersionedList::from_json(&rendered(&report).json).unwrap();
        let mirrored = list.tokens[0].logo_uri.clone().unwrap();
        assert!(!mirrored.contains("QmRYXpD8"));

        cfg.initial = false;
        let mut second = Fixture::new(records, Some(list));
        second.store = FakeStore::addressed("Qm");
        let report = second.run(&cfg).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Unchanged);
        assert_eq!(second.store.upload_count(), 0);
        assert!(second.pin.pinned.lock().unwrap().is_empty());
        assert!(second.names.pointers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_plans_mirrors_without_uploading() {
        let mut records = base();
        records[1].logo_uri = Some("ipfs://QmRYXpD8X4sQZwA1E4SJvEjVZpEK1WtSrTqzTWvGpZVDwa".into());
        let mut cfg = config(true);
        cfg.mirror_logos = true;

        let mut fx = Fixture::new(records, None);
        fx.store = FakeStore::addressed("Qm");
        let report = fx.run(&cfg).await.unwrap();

        assert_eq!(fx.store.upload_count(), 0);
        assert_eq!(report.stats.mirror.uploaded, 0);
        let list = VersionedList::from_json(&rendered(&report).json).unwrap();
        assert!(!list.tokens[1].logo_uri.as_deref().unwrap().contains("QmRYXpD8"));
    }

    #[tokio::test]
    async fn addition_bumps_minor() {
        let previous = published(base()).await;
        let mut records = base();
        records.push(token(3, "WETH", Some(18)));
        let report = Fixture::new(records, Some(previous))
            .run(&config(false))
            .await
            .unwrap();
        assert_eq!(report.version, Version::new(1, 1, 0));
        assert_eq!(report.bump, Bump::Minor);
    }

    #[tokio::test]
    async fn removal_bumps_major() {
        let previous = published(base()).await;
        let report = Fixture::new(vec![token(1, "USDC", Some(6))], Some(previous))
            .run(&config(false))
            .await
            .unwrap();
        assert_eq!(report.version, Version::new(2, 0, 0));
    }

    #[tokio::test]
    async fn detail_change_bumps_patch() {
        let previous = published(base()).await;
        let mut records = base();
        records[1].name = "Dai Stablecoin".into();
        let report = Fixture::new(records, Some(previous))
            .run(&config(false))
            .await
            .unwrap();
        assert_eq!(report.version, Version::new(1, 0, 1));
        assert_eq!(report.diff.changed.len(), 1);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_bytes() {
        let first = Fixture::new(base(), None).run(&config(true)).await.unwrap();
        let second = Fixture::new(base(), None).run(&config(true)).await.unwrap();
        assert_eq!(rendered(&first), rendered(&second));
        assert!(rendered(&first).json.contains(TIMESTAMP));
    }

    #[tokio::test]
    async fn invalid_tokens_are_excluded() {
        let mut records = base();
        records.push(token(3, "BAD SYMBOL", Some(18)));
        let report = Fixture::new(records, None).run(&config(true)).await.unwrap();

        assert_eq!(report.stats.invalid, 1);
        let list = VersionedList::from_json(&rendered(&report).json).unwrap();
        assert_eq!(list.tokens.len(), 2);
        assert!(list.tokens.iter().all(|t| t.symbol != "BAD SYMBOL"));
    }

    #[tokio::test]
    async fn nft_is_reclassified_without_curated_fallback() {
        let mut records = base();
        records.push(token(4, "PUNK", Some(0)));
        let mut fx = Fixture::new(records, None);
        fx.probe = FakeProbe::default().with_interface(4, ERC721_INTERFACE_ID);

        let report = fx.run(&config(true)).await.unwrap();
        assert_eq!(report.stats.reclassified, 1);
        assert_eq!(fx.curate.calls(), 0);

        let value: serde_json::Value = serde_json::from_str(&rendered(&report).json).unwrap();
        let punk = &value["tokens"][2];
        assert_eq!(punk["standard"], "erc721");
        assert!(punk.get("decimals").is_none());

        let list = VersionedList::from_json(&rendered(&report).json).unwrap();
        assert_eq!(list.tokens[2].standard, Some(NftStandard::Erc721));
    }

    #[tokio::test]
    async fn duplicates_and_padding_collapse() {
        let mut renamed = token(1, "USDC", Some(6));
        renamed.name = "USD Coin".into();
        let mut padding = token(0, "", Some(0));
        padding.address = ZERO_ADDRESS;
        let records = vec![token(1, "USDC", Some(6)), padding, token(2, "DAI", Some(18)), renamed];

        let report = Fixture::new(records, None).run(&config(true)).await.unwrap();
        assert_eq!(report.stats.raw, 4);
        assert_eq!(report.stats.deduplicated, 2);
        let list = VersionedList::from_json(&rendered(&report).json).unwrap();
        assert_eq!(list.tokens[0].name, "USD Coin");
        assert_eq!(list.tokens[1].symbol, "DAI");
    }

    #[tokio::test]
    async fn every_channel_failing_aborts_the_run() {
        let mut fx = Fixture::new(base(), None);
        fx.store = FakeStore::broken("Qm");
        let err = fx.run(&initial_config()).await.unwrap_err();
        assert!(err.to_string().contains("every upload channel failed"));
        assert!(fx.pin.pinned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_violation_aborts_before_publishing() {
        let fx = Fixture::new(base(), None);
        let mut cfg = initial_config();
        cfg.badges[0].key = "far_too_long_key".into();
        cfg.header = ListHeader::from_config(&ListConfig::default(), &cfg.badges);

        let err = fx.run(&cfg).await.unwrap_err();
        assert!(matches!(err, TokenListError::Schema { .. }));
        assert_eq!(fx.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn runs_are_recorded_in_history() {
        let path = std::env::temp_dir()
            .join(format!("tokenlist-pipeline-{}", uuid::Uuid::now_v7()))
            .join("history.db");
        let storage = Storage::open(&path).await.unwrap();
        let mut cfg = initial_config();
        cfg.output_path = Some(path.with_file_name("out.tokenlist.json"));

        let fx = Fixture::new(base(), None);
        let report = fx.run_with(&cfg, Some(&storage)).await.unwrap();

        let history = storage.list_publications("Kleros T2CR", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, Version::INITIAL);
        assert_eq!(history[0].content_id.as_deref(), Some("Qm1"));
        assert_eq!(history[0].sha256, rendered(&report).sha256);
        assert_eq!(history[0].token_count, 2);

        let written = std::fs::read_to_string(cfg.output_path.unwrap()).unwrap();
        assert_eq!(written, rendered(&report).json);
    }
}
