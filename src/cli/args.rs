use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use satcoloc::{Level, Mission, UniqueBy};

#[derive(Parser)]
#[command(name = "satcoloc", version, about = "Satellite product co-location CLI")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// YAML configuration (path templates, variable names, worker limits)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Co-locate two explicit products
    Pair {
        /// Primary product (first in the listing line)
        product1: String,
        /// Secondary product
        product2: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Co-locate a product with every product of a mission
    Mission {
        /// Primary product
        product: String,

        /// Mission searched for candidates
        #[arg(long, value_enum)]
        mission: Mission,

        /// SAR processing level of candidates (all levels when omitted)
        #[arg(long, value_enum)]
        level: Option<Level>,

        /// Explicit candidate products, or one .txt file listing them
        #[arg(long, num_args = 1..)]
        input_ds: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Co-locate every row of a pair table (CSV, or JSON ending in .json)
    Table {
        /// Pair table of ref/match granules
        table: PathBuf,

        /// Keep one row per granule of this column, the one with the closest start times
        #[arg(long, value_enum)]
        filter_unique: Option<UniqueBy>,

        /// Explicit products to resolve granules from, or one .txt file listing them
        #[arg(long, num_args = 1..)]
        input_ds: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Temporal tolerance in minutes
    #[arg(long, default_value_t = 60)]
    pub delta_time: i64,

    /// Minimal intersection area (e.g. 1600km2, 1600000000m2)
    #[arg(long, default_value = "1600km2")]
    pub minimal_area: String,

    /// Append co-located pairs to the listing file
    #[arg(long, default_value_t = false)]
    pub listing: bool,

    /// Don't build merged co-location products
    #[arg(long, default_value_t = false)]
    pub no_merge: bool,

    /// Output directory for the listing and merged products
    #[arg(long, default_value = "/tmp")]
    pub destination_folder: PathBuf,

    /// Listing filename override
    #[arg(long)]
    pub listing_filename: Option<String>,

    /// Merged product filename override
    #[arg(long)]
    pub colocation_filename: Option<String>,

    /// Worker threads for pair evaluation (overrides the configuration)
    #[arg(long)]
    pub workers: Option<usize>,
}
