use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use satcoloc::{
    BatchReport, ColocConfig, MinimalArea, RunParams, colocate_from_table, colocate_products,
    colocate_with_mission,
};

use super::args::{CliArgs, Command, RunArgs};
use super::errors::AppError;

fn run_params(
    run: &RunArgs,
    level: Option<satcoloc::Level>,
    input_ds: Vec<String>,
) -> Result<RunParams, AppError> {
    let minimal_area: MinimalArea =
        run.minimal_area
            .parse()
            .map_err(|_| AppError::InvalidMinimalArea {
                value: run.minimal_area.clone(),
            })?;
    Ok(RunParams {
        delta_time: run.delta_time,
        minimal_area,
        want_listing: run.listing,
        want_merge: !run.no_merge,
        level,
        input_ds: (!input_ds.is_empty()).then_some(input_ds),
        destination_folder: run.destination_folder.clone(),
        listing_filename: run.listing_filename.clone(),
        colocation_filename: run.colocation_filename.clone(),
    })
}

fn load_config(args: &CliArgs, workers: Option<usize>) -> Result<ColocConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => ColocConfig::load(path)?,
        None => ColocConfig::default(),
    };
    if let Some(workers) = workers {
        if workers == 0 {
            return Err(AppError::ZeroWorkers { workers });
        }
        config.workers = Some(workers);
    }
    Ok(config)
}

fn log_report(report: &BatchReport) {
    for result in &report.results {
        info!("{} -> {}", result.listing_line(), result.status);
    }
    if let Some(path) = &report.listing_path {
        info!("Listing: {:?}", path);
    }
    for path in &report.merged_paths {
        info!("Merged product: {:?}", path);
    }
    info!("Co-location complete!");
    info!("Evaluated: {}", report.evaluated);
    info!("Listed: {}", report.listed);
    info!("Merged: {}", report.merged);
    info!("Skipped: {}", report.skipped);
    info!("Errors: {}", report.errors);
    if report.cancelled {
        warn!("Run was cancelled before every candidate was evaluated");
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("satcoloc=debug,info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let report = match &args.command {
        Command::Pair {
            product1,
            product2,
            run,
        } => {
            let config = load_config(&args, run.workers)?;
            let params = run_params(run, None, Vec::new())?;
            info!("Co-locating pair {} / {}", product1, product2);
            colocate_products(product1, product2, &params, &config).map_err(AppError::from)?
        }
        Command::Mission {
            product,
            mission,
            level,
            input_ds,
            run,
        } => {
            if product.is_empty() {
                return Err(AppError::MissingArgument {
                    arg: "product".to_string(),
                }
                .into());
            }
            let config = load_config(&args, run.workers)?;
            let params = run_params(run, *level, input_ds.clone())?;
            info!("Co-locating {} with mission {}", product, mission);
            colocate_with_mission(product, *mission, &params, &config).map_err(AppError::from)?
        }
        Command::Table {
            table,
            filter_unique,
            input_ds,
            run,
        } => {
            let config = load_config(&args, run.workers)?;
            let params = run_params(run, None, input_ds.clone())?;
            info!("Co-locating pair table {:?}", table);
            colocate_from_table(table, *filter_unique, &params, &config).map_err(AppError::from)?
        }
    };

    log_report(&report);
    Ok(())
}
