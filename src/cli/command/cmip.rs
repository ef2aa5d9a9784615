//! The CMIP pipeline: extract every source into the climate table, then
//! render each requested model's input files.

use std::{fmt, path::PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::{error, info, warn};

use crate::{
    cli::create_progress_bar,
    config::PipelineConfig,
    extract::{extract_table, FailedTask},
    parquet,
    table::ClimateTable,
    writers::{Model, OutputStatus, SiteOutcome, SiteRequest},
};

#[derive(Args, Debug, Clone, Default)]
pub struct CmipArgs {
    /// YAML configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Directory holding the downloaded CMIP NetCDF files
    #[arg(long)]
    pub source_dir: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub start_year: Option<i32>,
    #[arg(long)]
    pub end_year: Option<i32>,
    /// Number of extraction workers
    #[arg(long)]
    pub workers: Option<usize>,
    /// Models to write; all of them when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    pub models: Vec<Model>,
    /// Save the extracted table as parquet
    #[arg(long)]
    pub save_table: Option<PathBuf>,
    /// Render from a saved table instead of reading the sources
    #[arg(long)]
    pub from_table: Option<PathBuf>,
}

impl CmipArgs {
    /// Builds the run configuration: defaults, then the config file, then flags.
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        if let Some(source_dir) = &self.source_dir {
            config.source_dir = Some(source_dir.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = Some(output_dir.clone());
        }
        if let Some(start_year) = self.start_year {
            config.start_year = start_year;
        }
        if let Some(end_year) = self.end_year {
            config.end_year = end_year;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn selected_models(&self) -> Vec<Model> {
        if self.models.is_empty() {
            Model::ALL.to_vec()
        } else {
            self.models.clone()
        }
    }
}

/// What one model wrote for one (experiment, site) pair.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub model: Model,
    pub experiment: String,
    pub site: usize,
    pub outcome: SiteOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub failures: Vec<FailedTask>,
    pub outputs: Vec<OutputRecord>,
}

impl RunSummary {
    /// True when every output was written in full.
    pub fn is_complete(&self) -> bool {
        self.outputs
            .iter()
            .all(|o| o.outcome.status() == OutputStatus::Written)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in &self.failures {
            writeln!(
                f,
                "FAILED  {} ({}): {}",
                failure.description,
                failure.path.display(),
                failure.reason
            )?;
        }
        for record in &self.outputs {
            write!(
                f,
                "{:<8}{} {} site_{}: {} files",
                record.outcome.status(),
                record.model,
                record.experiment,
                record.site,
                record.outcome.written.len()
            )?;
            if !record.outcome.missing.is_empty() {
                write!(f, ", missing {}", record.outcome.missing.join(", "))?;
            }
            if let Some(error) = &record.outcome.error {
                write!(f, ", {error}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub async fn cmip(args: &CmipArgs) -> Result<RunSummary> {
    let config = args.resolve()?;
    info!(
        source = %config.source_dir().display(),
        output = %config.output_dir().display(),
        years = ?config.years(),
        "starting CMIP pipeline"
    );

    let mut summary = RunSummary::default();
    let table = match &args.from_table {
        Some(path) => parquet::load_table(path, &config.experiments)?,
        None => {
            let extraction = extract_table(&config).await?;
            summary.failures = extraction.failures;
            extraction.table
        }
    };

    let missing = table.missing(
        config.experiments.len(),
        config.sites.len(),
        config.years(),
    );
    if !missing.is_empty() {
        warn!(
            slots = missing.len(),
            first = %missing[0],
            "climate table has empty slots"
        );
    }

    if let Some(path) = &args.save_table {
        parquet::save_table(&table, &config.experiments, path)?;
    }

    summary.outputs = render(&config, &table, &args.selected_models());

    Ok(summary)
}

/// Writes every model for every (experiment, site) pair of the configuration.
/// A pair the writer gives up on is recorded as failed and the rest still run.
pub fn render(
    config: &PipelineConfig,
    table: &ClimateTable,
    models: &[Model],
) -> Vec<OutputRecord> {
    let output_dir = config.output_dir();
    let pairs = config.experiments.len() * config.sites.len();
    let pb = create_progress_bar(
        (pairs * models.len()) as u64,
        "Writing model inputs".to_string(),
    );

    let mut records = Vec::new();
    for &model in models {
        for (experiment_index, experiment) in config.experiments.iter().enumerate() {
            for (site_index, site) in config.sites.iter().enumerate() {
                let request = SiteRequest {
                    experiment_index,
                    experiment,
                    site_index,
                    site,
                    years: config.years(),
                };
                let outcome = match model.write(table, &request, &output_dir) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(
                            model = %model,
                            experiment = experiment.as_str(),
                            site = site_index + 1,
                            error = %e,
                            "failed to write model inputs"
                        );
                        SiteOutcome::failed(e)
                    }
                };
                info!(
                    model = %model,
                    experiment = experiment.as_str(),
                    site = site_index + 1,
                    status = %outcome.status(),
                    files = outcome.written.len(),
                    "wrote model inputs"
                );
                records.push(OutputRecord {
                    model,
                    experiment: experiment.clone(),
                    site: site_index + 1,
                    outcome,
                });
                pb.inc(1);
            }
        }
    }
    pb.finish_with_message("Model inputs written");

    records
}

// -- Tests -------------------------------------------------------------------
