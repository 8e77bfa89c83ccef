#![doc = r#"
SATCOLOC — co-location of satellite wind products.

This crate decides whether two satellite products (SAR scenes, scatterometer
swaths, radiometer daily grids, ERA5 model fields) observe the same place at
about the same time, and produces either a listing entry or a merged
co-location dataset for each pair. It powers the `satcoloc` CLI and can be
embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve.
Breaking changes can occur.

Requirements
------------
- Rust 2024 edition toolchain.
- Products described by JSON product documents (see [`io::document`]), or your
  own [`io::MetadataAdapter`] / [`io::DatasetProvider`] implementations.

Quick start: co-locate two products
-----------------------------------
```rust,no_run
use satcoloc::{colocate_products, ColocConfig, RunParams};

fn main() -> satcoloc::Result<()> {
    let params = RunParams {
        delta_time: 60,
        minimal_area: "1600km2".parse()?,
        want_listing: true,
        destination_folder: "/out".into(),
        ..RunParams::default()
    };

    let report = colocate_products(
        "/data/era5/era_5-copernicus__20181009.nc",
        "/data/sar/s1a-ew-owi-cm-20181009t142906-20181009t143110-000003-02A122_ll_gd.nc",
        &params,
        &ColocConfig::default(),
    )?;

    for result in &report.results {
        println!("{} -> {}", result.listing_line(), result.status);
    }
    Ok(())
}
```

Co-locate with a whole mission
------------------------------
Candidates are discovered from the per-mission path templates of a YAML
configuration, expanded for every day of the product's time window widened by
`delta_time`.

```rust,no_run
use satcoloc::{colocate_with_mission, ColocConfig, Mission, RunParams};

fn main() -> satcoloc::Result<()> {
    let config = ColocConfig::load("/etc/satcoloc.yaml")?;
    let params = RunParams { want_listing: true, ..RunParams::default() };
    let report = colocate_with_mission(
        "/data/smos/SM_OPER_MIR_SCNFSW_20181009T000000_20181009T235959_300_001_7.nc",
        Mission::S1,
        &params,
        &config,
    )?;
    println!(
        "evaluated={} listed={} merged={} skipped={} errors={}",
        report.evaluated, report.listed, report.merged, report.skipped, report.errors
    );
    Ok(())
}
```

Co-locate a pair table
----------------------
Rows of granules already known to intersect (CSV or JSON) are resolved to
products with the `table` section of the configuration, then co-located in
table order.

```rust,no_run
use satcoloc::{colocate_from_table, ColocConfig, RunParams, UniqueBy};

fn main() -> satcoloc::Result<()> {
    let config = ColocConfig::load("/etc/satcoloc.yaml")?;
    let report = colocate_from_table(
        "/data/pairs/s1_hy2.csv",
        Some(UniqueBy::Ref),
        &RunParams::default(),
        &config,
    )?;
    println!("merged={} skipped={}", report.merged, report.skipped);
    Ok(())
}
```

Pair evaluation only
--------------------
```rust,no_run
use satcoloc::core::engine::IntersectionEngine;
use satcoloc::core::params::ColocationCriteria;
use satcoloc::io::{DocumentAdapter, MetadataAdapter};

fn main() -> satcoloc::Result<()> {
    let adapter = DocumentAdapter::default();
    let a = adapter.metadata("/data/a.nc")?;
    let b = adapter.metadata("/data/b.nc")?;
    let engine = IntersectionEngine::new(ColocationCriteria::default(), 25.0);
    let result = engine.evaluate(&a, &b);
    println!("{:?} {:?} km2", result.status, result.overlap_area_km2);
    Ok(())
}
```

Error handling
--------------
All public functions return `satcoloc::Result<T>`; match on `satcoloc::Error` to
handle specific cases. Configuration errors are returned before any pair is
evaluated; unreadable candidates are skipped and counted in the report.

```rust,no_run
use satcoloc::{colocate_products, ColocConfig, Error, RunParams};

fn main() {
    match colocate_products("/bad/a.nc", "/bad/b.nc", &RunParams::default(), &ColocConfig::default()) {
        Ok(report) => println!("{} listed", report.listed),
        Err(Error::Adapter(e)) => eprintln!("Primary product error: {e}"),
        Err(Error::Config(e)) => eprintln!("Configuration error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — high-level, ergonomic entry points.
- [`core`] — compatibility policy, intersection engine, merge and orchestrator.
- [`types`] — missions, levels, acquisition types and statuses.
- [`io`] — metadata adapters, product documents, candidate finder, pair tables, configuration and writers.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::engine::{IntersectionEngine, IntersectionResult, PairKey};
pub use core::merge::{MergedDataset, VariableStats};
pub use core::orchestrator::{ColocationOrchestrator, Targets};
pub use core::params::{ColocationCriteria, MinimalArea, RunParams};
pub use core::policy::{Compatibility, compatibility};
pub use error::{Error, Result};
pub use types::{AcquisitionType, CanonicalVar, ColocStatus, Level, Mission};

// Adapters and configuration
pub use io::{
    AdapterError, CandidateFinder, ColocConfig, DatasetProvider, DocumentAdapter,
    MetadataAdapter, PairTable, ProductMetadata, TemplateFinder, UniqueBy,
};

// High-level API re-exports
pub use api::{
    BatchReport, CancellationToken, colocate_from_table, colocate_products,
    colocate_with_mission, document_orchestrator, evaluate_products,
};
