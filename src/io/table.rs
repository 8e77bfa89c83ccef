//! Pair tables: granule pairs already known to intersect, usually exported by
//! an upstream footprint search, co-located row by row.
//!
//! A table is CSV with a header row, or a JSON array of row objects when the
//! file ends in `.json`. Times are RFC 3339. Geometries are optional WKT
//! polygons that replace the footprints read from the products.
//!
//! ```text
//! ref_granule,ref_start,ref_end,ref_geometry,match_granule,match_start,match_end,match_geometry,destination_folder
//! ```
//!
//! Granule names are not paths: each side is resolved to a product through the
//! candidate finder, searching the granule's time span widened by the side's
//! margin (see [`TableSide`]).
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::geometry::parse_wkt;
use crate::io::config::{ColocConfig, ConfigError, TableSide};
use crate::io::finder::{CandidateFinder, FinderError, basename, expand_template, wildcard_matcher};
use crate::io::metadata::TimeWindow;
use crate::types::{Level, Mission};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read pair table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CSV pair table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON pair table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pair table row {row}: {reason}")]
    Row { row: usize, reason: String },
}

/// One intersecting pair of granules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRow {
    pub ref_granule: String,
    pub ref_start: DateTime<Utc>,
    pub ref_end: DateTime<Utc>,
    #[serde(default)]
    pub ref_geometry: Option<String>,
    pub match_granule: String,
    pub match_start: DateTime<Utc>,
    pub match_end: DateTime<Utc>,
    #[serde(default)]
    pub match_geometry: Option<String>,
    /// Where this pair's merged product goes instead of the run's folder.
    #[serde(default)]
    pub destination_folder: Option<PathBuf>,
}

impl PairRow {
    fn check(&self, row: usize) -> Result<(), TableError> {
        let invalid = |reason: String| TableError::Row { row, reason };
        for (side, granule, start, end, geometry) in [
            ("ref", &self.ref_granule, self.ref_start, self.ref_end, &self.ref_geometry),
            (
                "match",
                &self.match_granule,
                self.match_start,
                self.match_end,
                &self.match_geometry,
            ),
        ] {
            if granule.trim().is_empty() {
                return Err(invalid(format!("empty {} granule", side)));
            }
            if start > end {
                return Err(invalid(format!(
                    "{} start {} is after its end {}",
                    side, start, end
                )));
            }
            if let Some(text) = geometry.as_deref().filter(|g| !g.trim().is_empty()) {
                parse_wkt(text).map_err(|e| invalid(format!("{} geometry: {}", side, e)))?;
            }
        }
        Ok(())
    }

    /// Absolute gap between the two start times.
    pub fn start_gap(&self) -> Duration {
        (self.ref_start - self.match_start).abs()
    }
}

/// Column whose granules must appear only once after filtering.
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueBy {
    Ref,
    Match,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairTable {
    rows: Vec<PairRow>,
}

impl PairTable {
    pub fn new(rows: Vec<PairRow>) -> Result<Self, TableError> {
        for (i, row) in rows.iter().enumerate() {
            row.check(i + 1)?;
        }
        Ok(Self { rows })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let read_error = |source| TableError::Read {
            path: path.display().to_string(),
            source,
        };
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let content = fs::read_to_string(path).map_err(read_error)?;
            Self::from_json_str(&content)
        } else {
            let file = fs::File::open(path).map_err(read_error)?;
            Self::from_csv_reader(file)
        }
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let rows = rdr
            .deserialize::<PairRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rows)
    }

    pub fn from_json_str(content: &str) -> Result<Self, TableError> {
        Self::new(serde_json::from_str(content)?)
    }

    pub fn rows(&self) -> &[PairRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep, for every granule of the `by` column, the row whose start times are
    /// closest. Ties go to the earlier row; surviving rows keep table order.
    pub fn filter_unique(&mut self, by: UniqueBy) {
        let mut best: HashMap<&str, usize> = HashMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key = match by {
                UniqueBy::Ref => row.ref_granule.as_str(),
                UniqueBy::Match => row.match_granule.as_str(),
            };
            best.entry(key)
                .and_modify(|kept| {
                    if row.start_gap() < self.rows[*kept].start_gap() {
                        *kept = i;
                    }
                })
                .or_insert(i);
        }
        let mut keep = vec![false; self.rows.len()];
        for i in best.into_values() {
            keep[i] = true;
        }
        let before = self.rows.len();
        let mut flags = keep.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        debug!(
            "Unique {:?} granules: kept {} of {} row(s)",
            by,
            self.rows.len(),
            before
        );
    }
}

/// Turns the granules of one table column into products.
#[derive(Debug, Clone)]
pub struct GranuleResolver {
    mission: Mission,
    level: Option<Level>,
    margin: Duration,
    name_template: Option<String>,
}

impl GranuleResolver {
    pub fn new(side: &TableSide, config: &ColocConfig) -> Result<Self, ConfigError> {
        let name_template = if side.match_filename {
            let templates = config.templates(side.mission, side.level)?;
            templates.first().map(|t| basename(t).to_string())
        } else {
            None
        };
        Ok(Self {
            mission: side.mission,
            level: side.level,
            margin: Duration::seconds(side.time_margin_seconds),
            name_template,
        })
    }

    pub fn mission(&self) -> Mission {
        self.mission
    }

    /// Product acquired over `[start, end]`, or `None` when nothing fits.
    ///
    /// Without name matching the first product found is taken; with it, the
    /// last product whose name matches the template expanded for `start`'s day.
    pub fn resolve(
        &self,
        finder: &dyn CandidateFinder,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<String>, FinderError> {
        let window = TimeWindow::new(start, end).widen(self.margin);
        let found = finder.find(self.mission, self.level, &window)?;
        let Some(template) = &self.name_template else {
            return Ok(found.into_iter().next());
        };
        let matcher = wildcard_matcher(&expand_template(template, start.date_naive()))?;
        Ok(found.into_iter().filter(|p| matcher.is_match(basename(p))).last())
    }
}

/// Resolvers of both table columns; the `ref` side is the primary of each pair.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub reference: GranuleResolver,
    pub matched: GranuleResolver,
}

impl TableLayout {
    pub fn from_config(config: &ColocConfig) -> Result<Self, ConfigError> {
        let settings = config.table_settings()?;
        Ok(Self {
            reference: GranuleResolver::new(&settings.reference, config)?,
            matched: GranuleResolver::new(&settings.matched, config)?,
        })
    }
}
