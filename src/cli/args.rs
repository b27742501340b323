use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chirps-power-wth")]
#[command(about = "Build DSSAT weather files from CHIRPS rainfall rasters and NASA POWER series")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Power,
    Table,
}

impl SourceArg {
    pub fn as_setting(&self) -> &'static str {
        match self {
            SourceArg::Power => "power",
            SourceArg::Table => "table",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one .WTH file per location of the input table
    Build {
        #[arg(short, long, help = "Settings file (TOML)")]
        config: Option<PathBuf>,

        #[arg(short, long, help = "Location table (CSV)")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Directory of daily CHIRPS GeoTIFFs")]
        raster_dir: Option<PathBuf>,

        #[arg(short, long, help = "Directory receiving the .WTH files")]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "First day, YYYY-MM-DD")]
        start: Option<NaiveDate>,

        #[arg(long, help = "Last day, YYYY-MM-DD")]
        end: Option<NaiveDate>,

        #[arg(long, value_enum, help = "Reanalysis source [default: power]")]
        reanalysis: Option<SourceArg>,

        #[arg(long, help = "Reanalysis table for the table source")]
        reanalysis_table: Option<PathBuf>,

        #[arg(long, help = "Header of the location id column [default: ID]")]
        id_column: Option<String>,

        #[arg(long, help = "Header of the reanalysis cell id column [default: nasapid]")]
        cell_column: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Institution code written in the header [default: UFL]")]
        institution: Option<String>,

        #[arg(long)]
        cache_dir: Option<PathBuf>,

        #[arg(long, help = "Leave locations whose output file exists untouched")]
        skip_existing: bool,

        #[arg(long, help = "Reuse raster and reanalysis tables from the cache directory")]
        reuse_cache: bool,

        #[arg(short, long, help = "Hide the progress display")]
        quiet: bool,
    },

    /// Repair solar radiation in existing .WTH files
    Qc {
        #[arg(short, long, help = "Directory of .WTH files")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Directory receiving the corrected files")]
        output_dir: PathBuf,

        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,
    },

    /// Append the data of same-named .WTH files from a second directory
    Merge {
        #[arg(long, help = "Directory whose files are copied")]
        first_dir: PathBuf,

        #[arg(long, help = "Directory whose data lines are appended")]
        second_dir: PathBuf,

        #[arg(short, long)]
        output_dir: PathBuf,
    },
}
