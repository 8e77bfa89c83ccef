//! High-level, ergonomic library API: co-locate two products, one product with
//! every product of a mission, or every row of a pair table, using the JSON
//! product-document adapter and
//! the configured path templates. Prefer these entrypoints over wiring the
//! orchestrator by hand when integrating satcoloc.
use std::path::Path;
use std::sync::Arc;

use crate::core::engine::{IntersectionEngine, IntersectionResult};
use crate::core::orchestrator::{ColocationOrchestrator, Targets};
use crate::core::params::RunParams;
use crate::error::Result;
use crate::io::adapter::MetadataAdapter;
use crate::io::config::ColocConfig;
use crate::io::document::DocumentAdapter;
use crate::io::finder::{ProductSource, TemplateFinder};
use crate::io::table::{PairTable, TableLayout, UniqueBy};
use crate::types::Mission;

pub use crate::core::orchestrator::{BatchReport, CancellationToken};

/// Orchestrator reading product documents and discovering candidates from
/// `config` templates (or from `params.input_ds` when given).
pub fn document_orchestrator(
    config: &ColocConfig,
    params: &RunParams,
) -> Result<ColocationOrchestrator> {
    let adapter = Arc::new(DocumentAdapter::new(config));
    let source = match &params.input_ds {
        Some(entries) => ProductSource::from_input_ds(entries)?,
        None => ProductSource::Filesystem,
    };
    let finder = Arc::new(TemplateFinder::new(config.clone(), source));
    ColocationOrchestrator::new(config, adapter.clone(), adapter, finder)
}

/// Co-locate two explicit products. `product_a` is the primary: it comes first
/// in the listing line.
pub fn colocate_products(
    product_a: &str,
    product_b: &str,
    params: &RunParams,
    config: &ColocConfig,
) -> Result<BatchReport> {
    document_orchestrator(config, params)?.run(
        product_a,
        &Targets::Product(product_b.to_string()),
        params,
    )
}

/// Co-locate `product` with every product of `mission` whose acquisition falls
/// in its time window widened by `params.delta_time`.
pub fn colocate_with_mission(
    product: &str,
    mission: Mission,
    params: &RunParams,
    config: &ColocConfig,
) -> Result<BatchReport> {
    let level = if mission.is_sar() { params.level } else { None };
    document_orchestrator(config, params)?.run(
        product,
        &Targets::Mission { mission, level },
        params,
    )
}

/// Co-locate every row of the pair table at `table_path` (CSV, or JSON when
/// the file ends in `.json`). Granules are resolved to products with the
/// `table` section of `config`; `unique` drops rows whose granule in that
/// column already appears in a row with closer start times.
pub fn colocate_from_table<P: AsRef<Path>>(
    table_path: P,
    unique: Option<UniqueBy>,
    params: &RunParams,
    config: &ColocConfig,
) -> Result<BatchReport> {
    let layout = TableLayout::from_config(config)?;
    let mut table = PairTable::load(table_path)?;
    if let Some(by) = unique {
        table.filter_unique(by);
    }
    document_orchestrator(config, params)?.run_table(&table, &layout, params)
}

/// Evaluate one pair without loading datasets or writing anything.
pub fn evaluate_products(
    product_a: &str,
    product_b: &str,
    params: &RunParams,
    config: &ColocConfig,
) -> Result<IntersectionResult> {
    params.validate()?;
    let adapter = DocumentAdapter::new(config);
    let a = adapter.metadata(product_a)?;
    let b = adapter.metadata(product_b)?;
    Ok(IntersectionEngine::new(params.criteria(), config.merge.radius_km).evaluate(&a, &b))
}
