//! Candidate discovery for mission-wide co-location.
//!
//! Path templates from the configuration are expanded once per day of the
//! search window (`%Y`, `%m`, `%d`, `%j` and `%(dayOfYear)`), then matched
//! either against the filesystem or against an explicit list of products.
//! Shell-style wildcards (`*`, `?`, `[...]`, `\` escapes) are compiled with
//! `globset`; on the filesystem a `*` never crosses a `/`.
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::io::config::{ColocConfig, ConfigError};
use crate::io::metadata::TimeWindow;
use crate::io::missions::{filename_time_span, smos_generation_key};
use crate::types::{Level, Mission};

#[derive(Debug, Error)]
pub enum FinderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read product list {path}: {source}")]
    ListRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Source of candidate products for one mission over a time window.
pub trait CandidateFinder: Send + Sync {
    fn find(
        &self,
        mission: Mission,
        level: Option<Level>,
        window: &TimeWindow,
    ) -> Result<Vec<String>, FinderError>;
}

/// Where expanded templates are matched.
#[derive(Debug, Clone, Default)]
pub enum ProductSource {
    #[default]
    Filesystem,
    Listed(Vec<String>),
}

impl ProductSource {
    /// Build from `input_ds`: one `.txt` entry is read as a list file with one
    /// product per line, anything else is taken as the product list itself.
    pub fn from_input_ds(entries: &[String]) -> Result<Self, FinderError> {
        if let [single] = entries {
            if single.ends_with(".txt") {
                let content = fs::read_to_string(single).map_err(|source| FinderError::ListRead {
                    path: single.clone(),
                    source,
                })?;
                return Ok(ProductSource::Listed(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(String::from)
                        .collect(),
                ));
            }
        }
        Ok(ProductSource::Listed(entries.to_vec()))
    }
}

#[derive(Debug, Clone)]
pub struct TemplateFinder {
    config: ColocConfig,
    source: ProductSource,
}

impl TemplateFinder {
    pub fn new(config: ColocConfig, source: ProductSource) -> Self {
        Self { config, source }
    }

    fn matches(&self, pattern: &str) -> Result<Vec<String>, FinderError> {
        match &self.source {
            ProductSource::Filesystem => glob_paths(pattern),
            ProductSource::Listed(list) => {
                let matcher = wildcard_matcher(pattern)?;
                Ok(list
                    .iter()
                    .filter(|p| matcher.is_match(p.as_str()))
                    .cloned()
                    .collect())
            }
        }
    }
}

impl CandidateFinder for TemplateFinder {
    fn find(
        &self,
        mission: Mission,
        level: Option<Level>,
        window: &TimeWindow,
    ) -> Result<Vec<String>, FinderError> {
        let templates = self.config.templates(mission, level)?;
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for day in days_of(window) {
            for template in &templates {
                let pattern = expand_template(template, day);
                for path in self.matches(&pattern)? {
                    if seen.insert(path.clone()) {
                        found.push(path);
                    }
                }
            }
        }

        if mission.is_sar() || mission == Mission::Era5 {
            found.retain(|path| match filename_time_span(mission, basename(path)) {
                Ok(Some(span)) => span.intersects(window),
                Ok(None) => true,
                Err(e) => {
                    debug!("Keeping {} despite unreadable name times: {}", path, e);
                    true
                }
            });
        }
        if mission == Mission::Smos {
            found = latest_smos_generations(found);
        }
        debug!("{} candidates found for {}", found.len(), mission);
        Ok(found)
    }
}

pub(crate) fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn days_of(window: &TimeWindow) -> Vec<NaiveDate> {
    let last = window.stop.date_naive();
    let mut day = window.start.date_naive();
    let mut days = Vec::new();
    while day <= last {
        days.push(day);
        day += Duration::days(1);
    }
    days
}

/// Substitute the date tokens of a path template.
pub fn expand_template(template: &str, day: NaiveDate) -> String {
    let doy = day.format("%j").to_string();
    template
        .replace("%(dayOfYear)", &doy)
        .replace("%Y", &day.format("%Y").to_string())
        .replace("%m", &day.format("%m").to_string())
        .replace("%d", &day.format("%d").to_string())
        .replace("%j", &doy)
}

/// Matcher for a whole-string wildcard pattern; `*` may span `/`.
pub fn wildcard_matcher(pattern: &str) -> Result<GlobMatcher, FinderError> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| FinderError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Existing paths matching `pattern`, sorted.
pub fn glob_paths(pattern: &str) -> Result<Vec<String>, FinderError> {
    let parts: Vec<&str> = pattern.split('/').collect();
    let Some(first_wild) = parts.iter().position(|p| has_wildcard(p)) else {
        return Ok(if Path::new(pattern).exists() {
            vec![pattern.to_string()]
        } else {
            Vec::new()
        });
    };
    let base = match parts[..first_wild].join("/") {
        b if b.is_empty() && pattern.starts_with('/') => "/".to_string(),
        b if b.is_empty() => ".".to_string(),
        b => b,
    };
    let rest = parts[first_wild..]
        .iter()
        .map(|p| wildcard_matcher(p))
        .collect::<Result<Vec<_>, _>>()?;
    let depth = rest.len();

    let mut out: Vec<String> = WalkDir::new(&base)
        .min_depth(depth)
        .max_depth(depth)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            let Ok(rel) = entry.path().strip_prefix(&base) else {
                return false;
            };
            let comps: Vec<_> = rel.iter().collect();
            comps.len() == depth && rest.iter().zip(&comps).all(|(m, c)| m.is_match(c))
        })
        .map(|entry| entry.path().display().to_string())
        .collect();
    out.sort();
    Ok(out)
}

/// Keep, for every SMOS product, only its highest generation. Names that don't
/// follow the SMOS layout are kept unchanged.
pub fn latest_smos_generations(paths: Vec<String>) -> Vec<String> {
    let mut latest: BTreeMap<String, (i64, String)> = BTreeMap::new();
    let mut others = Vec::new();
    for path in paths {
        match smos_generation_key(basename(&path)) {
            Some((prefix, _, _, generation)) => {
                let keep = latest
                    .get(&prefix)
                    .is_none_or(|(best, _)| generation >= *best);
                if keep {
                    latest.insert(prefix, (generation, path));
                }
            }
            None => others.push(path),
        }
    }
    latest.into_values().map(|(_, p)| p).chain(others).collect()
}
