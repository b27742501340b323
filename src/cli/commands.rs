use crate::cli::args::{Cli, Commands};
use crate::error::{ProcessingError, Result};
use crate::processors::{BatchReport, Pipeline, WthQualityControl};
use crate::settings::{ReanalysisSourceKind, RunConfig};
use crate::sources::{PowerClient, ReanalysisTable};
use crate::utils::progress::ProgressReporter;
use crate::writers::WthMerger;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Level};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Build {
            config,
            input,
            raster_dir,
            output_dir,
            start,
            end,
            reanalysis,
            reanalysis_table,
            id_column,
            cell_column,
            max_workers,
            institution,
            cache_dir,
            skip_existing,
            reuse_cache,
            quiet,
        } => {
            let path = |p: Option<PathBuf>| p.map(|p| p.to_string_lossy().to_string());
            let flag = |set: bool| set.then(|| "true".to_string());

            let overrides = [
                ("input", path(input)),
                ("raster_dir", path(raster_dir)),
                ("output_dir", path(output_dir)),
                ("start", start.map(|d| d.to_string())),
                ("end", end.map(|d| d.to_string())),
                ("reanalysis", reanalysis.map(|r| r.as_setting().to_string())),
                ("reanalysis_table", path(reanalysis_table)),
                ("id_column", id_column),
                ("cell_column", cell_column),
                ("max_workers", max_workers.map(|n| n.to_string())),
                ("institution", institution),
                ("cache_dir", path(cache_dir)),
                ("skip_existing", flag(skip_existing)),
                ("reuse_cache", flag(reuse_cache)),
            ];
            let run_config = RunConfig::load(config.as_deref(), &overrides)?;

            println!("Building weather files...");
            println!("Locations: {}", run_config.input.display());
            println!("Rasters: {}", run_config.raster_dir.display());
            println!("Output directory: {}", run_config.output_dir.display());
            println!(
                "Period: {} to {}, workers: {}",
                run_config.start, run_config.end, run_config.max_workers
            );

            let progress = ProgressReporter::new_spinner("Preparing...", quiet);
            let report = build(run_config, &progress).await?;
            println!("\n{}", report.summary());
        }

        Commands::Qc {
            input_dir,
            output_dir,
            max_workers,
        } => {
            println!("Repairing solar radiation...");
            println!("Input directory: {}", input_dir.display());
            println!("Output directory: {}", output_dir.display());

            let progress = ProgressReporter::new_spinner("Reading weather files...", false);
            let report = WthQualityControl::new(max_workers).run(&input_dir, &output_dir, Some(&progress))?;
            println!("\n{}", report.summary());
        }

        Commands::Merge {
            first_dir,
            second_dir,
            output_dir,
        } => {
            let report = WthMerger::new().merge_directories(&first_dir, &second_dir, &output_dir)?;

            println!("Merged {} files into {}", report.merged.len(), output_dir.display());
            for name in &report.not_updated {
                println!("The file {} will not be updated.", name);
            }
        }
    }

    Ok(())
}

async fn build(run_config: RunConfig, progress: &ProgressReporter) -> Result<BatchReport> {
    match run_config.reanalysis {
        ReanalysisSourceKind::Power => {
            let client = PowerClient::new(
                &run_config.power_url,
                run_config.request_timeout(),
                run_config.max_retries,
                run_config.retry_delay(),
            )?;
            info!(url = %run_config.power_url, "using NASA POWER service");
            Pipeline::new(run_config, client).run(Some(progress)).await
        }
        ReanalysisSourceKind::Table => {
            let table_path = run_config.reanalysis_table.clone().ok_or_else(|| {
                ProcessingError::Config("the table source needs `reanalysis_table`".to_string())
            })?;
            let table = ReanalysisTable::from_path(&table_path, &run_config.cell_column)?;
            Pipeline::new(run_config, table).run(Some(progress)).await
        }
    }
}

/// INFO by default, DEBUG when verbose; a log file replaces stderr
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let result = match log_file {
        Some(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(File::create(path)?))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| ProcessingError::Config(format!("Failed to initialise logging: {}", e)))
}
