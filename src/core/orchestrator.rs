//! Batch co-location of one primary product against a set of candidates, or of
//! every row of a pair table.
//!
//! The orchestrator resolves candidates (one explicit product, every product
//! of a mission found in the primary's widened time window, or the products
//! standing for each table row's granules), evaluates each
//! pair on a bounded worker pool, runs merges on a smaller pool of their own,
//! and materializes listing lines and merged datasets according to the run
//! switches.
//!
//! Results are returned, and listing lines appended, in discovery or table order.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::engine::{IntersectionEngine, IntersectionResult};
use crate::core::geometry::parse_wkt;
use crate::core::params::RunParams;
use crate::error::{Error, Result};
use crate::io::adapter::{AdapterError, DatasetProvider, MetadataAdapter};
use crate::io::config::ColocConfig;
use crate::io::finder::CandidateFinder;
use crate::io::metadata::ProductMetadata;
use crate::io::table::{PairRow, PairTable, TableLayout};
use crate::io::writers::{ListingWriter, listing_filename, write_merged_dataset};
use crate::types::{Level, Mission};

/// What the primary product is compared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    Product(String),
    Mission { mission: Mission, level: Option<Level> },
}

/// Batch-level cancellation flag shared between the caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Pairs that went through evaluation.
    pub evaluated: usize,
    pub listed: usize,
    pub merged: usize,
    /// Candidates whose metadata couldn't be resolved.
    pub skipped: usize,
    /// Output writes that failed.
    pub errors: usize,
    pub cancelled: bool,
    pub listing_path: Option<PathBuf>,
    pub merged_paths: Vec<PathBuf>,
    pub results: Vec<IntersectionResult>,
}

enum Outcome {
    Evaluated {
        result: IntersectionResult,
        merged_path: Option<PathBuf>,
        write_failed: bool,
    },
    Skipped,
    Abandoned,
}

pub struct ColocationOrchestrator {
    adapter: Arc<dyn MetadataAdapter>,
    provider: Arc<dyn DatasetProvider>,
    finder: Arc<dyn CandidateFinder>,
    pool: rayon::ThreadPool,
    /// Merges run on `max_concurrent_merges` threads of their own.
    merge_pool: rayon::ThreadPool,
    radius_km: f64,
    cancel: CancellationToken,
}

impl ColocationOrchestrator {
    pub fn new(
        config: &ColocConfig,
        adapter: Arc<dyn MetadataAdapter>,
        provider: Arc<dyn DatasetProvider>,
        finder: Arc<dyn CandidateFinder>,
    ) -> Result<Self> {
        config.validate()?;
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = config.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .thread_name(|i| format!("coloc-worker-{}", i))
            .build()
            .map_err(Error::external)?;
        let merge_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrent_merges.max(1))
            .thread_name(|i| format!("coloc-merge-{}", i))
            .build()
            .map_err(Error::external)?;
        Ok(Self {
            adapter,
            provider,
            finder,
            pool,
            merge_pool,
            radius_km: config.merge.radius_km,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` to cancel runs of this orchestrator.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Candidate references for `targets`, deduplicated, without the primary.
    fn candidates(
        &self,
        primary: &ProductMetadata,
        targets: &Targets,
        params: &RunParams,
    ) -> Result<Vec<String>> {
        let found = match targets {
            Targets::Product(source_ref) => vec![source_ref.clone()],
            Targets::Mission { mission, level } => {
                let window = primary.time_window().widen(params.criteria().delta_time);
                self.finder.find(*mission, *level, &window)?
            }
        };
        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .filter(|c| c != primary.source_ref() && seen.insert(c.clone()))
            .collect())
    }

    fn process_candidate(
        &self,
        engine: &IntersectionEngine,
        primary: &ProductMetadata,
        candidate: &str,
        params: &RunParams,
    ) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Abandoned;
        }
        let meta = match self.adapter.metadata(candidate) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping candidate {}: {}", candidate, e);
                return Outcome::Skipped;
            }
        };
        self.process_pair(engine, primary, &meta, params, &params.destination_folder)
    }

    /// Metadata of a table product, with the row's footprint when it has one.
    fn row_metadata(
        &self,
        source_ref: &str,
        geometry: Option<&str>,
    ) -> std::result::Result<ProductMetadata, AdapterError> {
        let meta = self.adapter.metadata(source_ref)?;
        match geometry.filter(|g| !g.trim().is_empty()) {
            None => Ok(meta),
            Some(text) => {
                let footprint =
                    parse_wkt(text).map_err(|message| AdapterError::InvalidFootprint {
                        source_ref: source_ref.to_string(),
                        message,
                    })?;
                meta.with_footprint(footprint)
            }
        }
    }

    fn process_row(
        &self,
        engine: &IntersectionEngine,
        row: &PairRow,
        products: &(String, String),
        params: &RunParams,
    ) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Abandoned;
        }
        let (reference, matched) = products;
        let metas = self
            .row_metadata(reference, row.ref_geometry.as_deref())
            .and_then(|r| Ok((r, self.row_metadata(matched, row.match_geometry.as_deref())?)));
        let (primary, meta) = match metas {
            Ok(metas) => metas,
            Err(e) => {
                warn!(
                    "Skipping row {} / {}: {}",
                    row.ref_granule, row.match_granule, e
                );
                return Outcome::Skipped;
            }
        };
        let destination = row
            .destination_folder
            .as_deref()
            .unwrap_or(&params.destination_folder);
        self.process_pair(engine, &primary, &meta, params, destination)
    }

    fn process_pair(
        &self,
        engine: &IntersectionEngine,
        primary: &ProductMetadata,
        meta: &ProductMetadata,
        params: &RunParams,
        destination: &Path,
    ) -> Outcome {
        let result = engine.evaluate(primary, meta);
        if !(params.want_merge && result.merge_allowed) {
            return Outcome::Evaluated {
                result,
                merged_path: None,
                write_failed: false,
            };
        }

        let provider = self.provider.as_ref();
        let result = self
            .merge_pool
            .install(|| engine.merge(result, primary, meta, provider));
        let mut merged_path = None;
        let mut write_failed = false;
        if let Some(ds) = result.merged_dataset.as_ref() {
            let name = params
                .colocation_filename
                .clone()
                .unwrap_or_else(|| ds.default_filename());
            match write_merged_dataset(ds, &destination.join(name)) {
                Ok(path) => merged_path = Some(path),
                Err(e) => {
                    warn!("Failed to write merged dataset of {}: {}", result.listing_line(), e);
                    write_failed = true;
                }
            }
        }
        Outcome::Evaluated {
            result,
            merged_path,
            write_failed,
        }
    }

    /// Co-locate `primary` with `targets`.
    ///
    /// Configuration problems and an unreadable primary are returned as errors
    /// before any pair is evaluated; everything after that is reported in the
    /// [`BatchReport`].
    pub fn run(&self, primary: &str, targets: &Targets, params: &RunParams) -> Result<BatchReport> {
        params.validate()?;
        let primary = self.adapter.metadata(primary)?;
        let candidates = self.candidates(&primary, targets, params)?;
        info!(
            "Co-locating {} with {} candidate(s)",
            primary.source_ref(),
            candidates.len()
        );

        let engine = IntersectionEngine::new(params.criteria(), self.radius_km);
        let outcomes: Vec<Outcome> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|c| self.process_candidate(&engine, &primary, c, params))
                .collect()
        });

        let secondary = match targets {
            Targets::Mission { mission, .. } => Some(*mission),
            Targets::Product(_) => None,
        };
        Ok(self.finish(outcomes, secondary, params))
    }

    /// Co-locate every row of a pair table, the `ref` granule being the primary
    /// of its pair.
    ///
    /// Granules are resolved to products through the finder before any pair is
    /// evaluated; finder failures are returned as errors. Rows whose granules
    /// resolve to nothing, or whose products can't be read, are skipped.
    pub fn run_table(
        &self,
        table: &PairTable,
        layout: &TableLayout,
        params: &RunParams,
    ) -> Result<BatchReport> {
        params.validate()?;
        let finder = self.finder.as_ref();
        let resolved: Vec<Option<(String, String)>> = self.pool.install(|| {
            table
                .rows()
                .par_iter()
                .map(|row| -> Result<Option<(String, String)>> {
                    let reference = layout.reference.resolve(finder, row.ref_start, row.ref_end)?;
                    let matched = layout
                        .matched
                        .resolve(finder, row.match_start, row.match_end)?;
                    Ok(reference.zip(matched))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        info!("Co-locating {} table row(s)", table.len());

        let engine = IntersectionEngine::new(params.criteria(), self.radius_km);
        let outcomes: Vec<Outcome> = self.pool.install(|| {
            table
                .rows()
                .par_iter()
                .zip(&resolved)
                .map(|(row, products)| match products {
                    Some(products) => self.process_row(&engine, row, products, params),
                    None => {
                        warn!(
                            "No products found for row {} / {}",
                            row.ref_granule, row.match_granule
                        );
                        Outcome::Skipped
                    }
                })
                .collect()
        });
        Ok(self.finish(outcomes, Some(layout.matched.mission()), params))
    }

    /// Fold outcomes into a report, in order, then write the listing.
    fn finish(
        &self,
        outcomes: Vec<Outcome>,
        secondary: Option<Mission>,
        params: &RunParams,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Evaluated {
                    result,
                    merged_path,
                    write_failed,
                } => {
                    report.evaluated += 1;
                    if result.is_listed() {
                        report.listed += 1;
                    }
                    if let Some(path) = merged_path {
                        report.merged += 1;
                        report.merged_paths.push(path);
                    }
                    if write_failed {
                        report.errors += 1;
                    }
                    report.results.push(result);
                }
                Outcome::Skipped => report.skipped += 1,
                Outcome::Abandoned => report.cancelled = true,
            }
        }
        report.cancelled |= self.cancel.is_cancelled();

        if params.want_listing {
            self.write_listing(secondary, params, &mut report);
        }
        info!(
            "Done: {} evaluated, {} listed, {} merged, {} skipped, {} error(s){}",
            report.evaluated,
            report.listed,
            report.merged,
            report.skipped,
            report.errors,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Append listed pairs in order through a single writer. The default name
    /// uses the first listed pair's missions unless `secondary` is known.
    fn write_listing(&self, secondary: Option<Mission>, params: &RunParams, report: &mut BatchReport) {
        let listed: Vec<&IntersectionResult> =
            report.results.iter().filter(|r| r.is_listed()).collect();
        let Some(first) = listed.first() else {
            return;
        };
        let name = params.listing_filename.clone().unwrap_or_else(|| {
            listing_filename(
                first.missions.0,
                secondary.unwrap_or(first.missions.1),
                params.delta_time,
            )
        });
        let path = params.destination_folder.join(name);
        let mut writer = match ListingWriter::open(&path) {
            Ok(w) => w,
            Err(e) => {
                warn!("Can't open listing {:?}: {}", path, e);
                report.errors += listed.len();
                return;
            }
        };
        let mut failures = 0;
        for result in listed {
            match writer.append(&result.pair.0, &result.pair.1) {
                Ok(true) => debug!("Listed {}", result.listing_line()),
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to list {}: {}", result.listing_line(), e);
                    failures += 1;
                }
            }
        }
        report.errors += failures;
        report.listing_path = Some(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{Duration, TimeZone, Utc};
    use geo::polygon;

    use crate::io::config::TableSide;
    use crate::io::dataset::Dataset;
    use crate::io::finder::FinderError;
    use crate::io::metadata::TimeWindow;

    struct Fixed(HashMap<String, ProductMetadata>);

    impl MetadataAdapter for Fixed {
        fn metadata(&self, source_ref: &str) -> std::result::Result<ProductMetadata, AdapterError> {
            self.0
                .get(source_ref)
                .cloned()
                .ok_or_else(|| AdapterError::UnknownMission {
                    name: source_ref.to_string(),
                })
        }
    }

    impl DatasetProvider for Fixed {
        fn dataset(&self, meta: &ProductMetadata) -> std::result::Result<Dataset, AdapterError> {
            Err(AdapterError::MissingVariable {
                source_ref: meta.source_ref().to_string(),
                variable: "all".into(),
            })
        }
    }

    struct Listed(Vec<String>);

    impl CandidateFinder for Listed {
        fn find(
            &self,
            _: Mission,
            _: Option<Level>,
            _: &TimeWindow,
        ) -> std::result::Result<Vec<String>, FinderError> {
            Ok(self.0.clone())
        }
    }

    fn meta(mission: Mission, hour: u32, x0: f64, name: &str) -> ProductMetadata {
        let start = Utc.with_ymd_and_hms(2018, 10, 9, hour, 0, 0).unwrap();
        let fp = polygon![
            (x: x0, y: 0.0),
            (x: x0 + 2.0, y: 0.0),
            (x: x0 + 2.0, y: 2.0),
            (x: x0, y: 2.0),
            (x: x0, y: 0.0),
        ];
        let level = mission.is_sar().then_some(Level::L2);
        ProductMetadata::new(mission, level, start, start + Duration::hours(1), fp, name).unwrap()
    }

    /// Finds the fixed products of a mission acquired in the window.
    struct InWindow(Vec<ProductMetadata>);

    impl CandidateFinder for InWindow {
        fn find(
            &self,
            mission: Mission,
            _: Option<Level>,
            window: &TimeWindow,
        ) -> std::result::Result<Vec<String>, FinderError> {
            Ok(self
                .0
                .iter()
                .filter(|m| m.mission() == mission && m.time_window().intersects(window))
                .map(|m| m.source_ref().to_string())
                .collect())
        }
    }

    fn metas() -> Vec<ProductMetadata> {
        vec![
            meta(Mission::Era5, 10, 0.0, "era"),
            meta(Mission::Smap, 10, 1.0, "near"),
            meta(Mission::Smap, 10, 50.0, "far"),
            meta(Mission::Smap, 20, 0.0, "late"),
            meta(Mission::S1, 10, 0.5, "sar"),
        ]
    }

    fn orchestrator(candidates: Vec<&str>) -> ColocationOrchestrator {
        let fixed = Arc::new(Fixed(
            metas()
                .into_iter()
                .map(|m| (m.source_ref().to_string(), m))
                .collect(),
        ));
        let config = ColocConfig {
            workers: Some(2),
            ..ColocConfig::default()
        };
        ColocationOrchestrator::new(
            &config,
            fixed.clone(),
            fixed,
            Arc::new(Listed(candidates.into_iter().map(String::from).collect())),
        )
        .unwrap()
    }

    #[test]
    fn results_follow_discovery_order_and_skip_primary() {
        let o = orchestrator(vec!["late", "era", "missing", "near", "near", "far"]);
        let params = RunParams {
            want_merge: false,
            ..RunParams::default()
        };
        let targets = Targets::Mission {
            mission: Mission::Smap,
            level: None,
        };
        let report = o.run("era", &targets, &params).unwrap();
        let order: Vec<&str> = report.results.iter().map(|r| r.pair.1.as_str()).collect();
        assert_eq!(order, vec!["late", "near", "far"]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.listed, 1);
        assert!(!report.cancelled);
    }

    #[test]
    fn cancelled_batch_abandons_pending_pairs() {
        let o = orchestrator(vec!["near", "far"]);
        o.cancellation_token().cancel();
        let report = o
            .run("era", &Targets::Product("near".into()), &RunParams::default())
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.evaluated, 0);
    }

    #[test]
    fn unreadable_primary_is_fatal() {
        let o = orchestrator(vec![]);
        assert!(matches!(
            o.run("nope", &Targets::Product("near".into()), &RunParams::default()),
            Err(Error::Adapter(_))
        ));
    }

    #[test]
    fn merge_load_failure_leaves_pair_listed_only() {
        let dir = tempfile::tempdir().unwrap();
        let o = orchestrator(vec![]);
        let params = RunParams {
            want_listing: true,
            destination_folder: dir.path().to_path_buf(),
            ..RunParams::default()
        };
        let report = o.run("era", &Targets::Product("sar".into()), &params).unwrap();
        assert!(report.results[0].merge_allowed);
        assert_eq!(report.results[0].status, crate::types::ColocStatus::ListedOnly);
        assert_eq!(report.merged, 0);
        let listing = dir.path().join("listing_coloc_ERA5_SAR_60.txt");
        assert_eq!(report.listing_path.as_deref(), Some(listing.as_path()));
        assert_eq!(std::fs::read_to_string(listing).unwrap(), "era:sar\n");
    }

    fn table_layout() -> TableLayout {
        let config = ColocConfig {
            table: Some(crate::io::config::TableSettings {
                reference: TableSide {
                    mission: Mission::Era5,
                    level: None,
                    time_margin_seconds: 0,
                    match_filename: false,
                },
                matched: TableSide {
                    mission: Mission::Smap,
                    level: None,
                    time_margin_seconds: 60,
                    match_filename: false,
                },
            }),
            ..ColocConfig::default()
        };
        TableLayout::from_config(&config).unwrap()
    }

    fn row(ref_hour: u32, match_hour: u32, match_geometry: Option<&str>) -> PairRow {
        let at = |h| Utc.with_ymd_and_hms(2018, 10, 9, h, 0, 0).unwrap();
        PairRow {
            ref_granule: format!("era_{}", ref_hour),
            ref_start: at(ref_hour),
            ref_end: at(ref_hour + 1),
            ref_geometry: None,
            match_granule: format!("smap_{}", match_hour),
            match_start: at(match_hour),
            match_end: at(match_hour + 1),
            match_geometry: match_geometry.map(String::from),
            destination_folder: None,
        }
    }

    #[test]
    fn table_rows_resolve_and_keep_table_order() {
        let fixed = Arc::new(Fixed(
            metas()
                .into_iter()
                .map(|m| (m.source_ref().to_string(), m))
                .collect(),
        ));
        let o = ColocationOrchestrator::new(
            &ColocConfig::default(),
            fixed.clone(),
            fixed,
            Arc::new(InWindow(metas())),
        )
        .unwrap();
        let table = PairTable::new(vec![
            row(10, 10, None),
            row(10, 20, None),
            row(10, 10, Some("POLYGON((50 0,52 0,52 2,50 2,50 0))")),
            row(3, 10, None),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let params = RunParams {
            want_listing: true,
            want_merge: false,
            destination_folder: dir.path().to_path_buf(),
            ..RunParams::default()
        };

        let report = o.run_table(&table, &table_layout(), &params).unwrap();
        let pairs: Vec<(&str, &str)> = report
            .results
            .iter()
            .map(|r| (r.pair.0.as_str(), r.pair.1.as_str()))
            .collect();
        assert_eq!(pairs, vec![("era", "near"), ("era", "late"), ("era", "near")]);
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.listed, 1);
        assert!(report.results[0].is_listed());
        assert!(!report.results[2].is_listed());
        let listing = report.listing_path.unwrap();
        assert_eq!(std::fs::read_to_string(listing).unwrap(), "era:near\n");
    }

    #[test]
    fn table_run_without_table_settings_is_a_config_error() {
        assert!(matches!(
            TableLayout::from_config(&ColocConfig::default()),
            Err(crate::io::ConfigError::InvalidValue { field: "table", .. })
        ));
    }
}
