use std::{path::PathBuf, time::Duration};

use derive_more::{Display, Error, From};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use super::{
    super::{
        game_data::Ruleset,
        metrics::{MetricsPipeline, PipelineError},
        save_file::{ContainerSource, SaveDataProvider, SaveFileCache},
        state::StateAccessor,
        types::Turn,
    },
    config::{ConfigError, Format, ReportConfig},
    json_io::{write_time_series_csv, write_world_data, ReportIoError},
};

/// An error that stopped a single report from being written
#[derive(Debug, From, Display, Error)]
pub enum ReportError {
    PipelineError(PipelineError),
    IoError(ReportIoError),
}

/// Generates the reports of a recording, one per configured report turn.
pub struct ReportGenerator {
    config: ReportConfig,
    accessor: StateAccessor,
    ruleset: Ruleset,
    saves: Box<dyn SaveDataProvider>,
    username: String,
}

impl ReportGenerator {
    /// Validates the config against the recording. Nothing expensive
    /// happens until [ReportGenerator::generate_reports] is called.
    pub fn new(config: ReportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let accessor = StateAccessor::index(&config.recording_dir)?;
        let max_turn = accessor.max_turn();
        if let Some(turn) = config.report_turns.iter().find(|t| **t > max_turn) {
            return Err(ConfigError::TurnOutOfRange(*turn, max_turn));
        }
        let ruleset = match config.ruleset_path() {
            Some(path) => {
                info!("loading ruleset from {}", path.display());
                Ruleset::load(path)?
            }
            None => Ruleset::default(),
        };
        let username = config.username();
        let mut cache = SaveFileCache::new(config.save_cache_dir(), username.clone());
        if let Some(container) = &config.container {
            cache = cache.with_source(Box::new(ContainerSource::new(container.clone())));
        }
        Ok(ReportGenerator {
            config,
            accessor,
            ruleset,
            saves: Box::new(cache),
            username,
        })
    }

    /// Replaces the save file cache with another provider
    pub fn with_save_data(mut self, saves: Box<dyn SaveDataProvider>) -> Self {
        self.saves = saves;
        self
    }

    pub fn accessor(&self) -> &StateAccessor {
        &self.accessor
    }

    /// Generates every configured report. A failed report is logged and
    /// skipped, the paths of everything written are returned.
    pub fn generate_reports(&self) -> Vec<PathBuf> {
        let summary = self.accessor.summary();
        info!(
            "recording {}: {} turns in {} files, turns {} to {}",
            summary.recording_dir.display(),
            summary.total_turns,
            summary.total_files,
            summary.turn_range.0,
            summary.turn_range.1
        );
        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        // one bar over the reports, and one over the turns of the current report
        let progress = MultiProgress::new();
        let report_progress =
            progress.add(ProgressBar::new(self.config.report_turns.len() as u64));
        report_progress.set_style(bar_style.clone());
        report_progress.enable_steady_tick(Duration::from_secs(1));
        let mut written = Vec::new();
        let mut failed = 0;
        for turn in report_progress.wrap_iter(self.config.report_turns.iter()) {
            report_progress.set_message(format!("Turn {}", turn));
            let turn_progress = progress.add(ProgressBar::new(0));
            turn_progress.set_style(bar_style.clone());
            turn_progress.set_message("Collecting metrics");
            match self.generate(*turn, Some(turn_progress.clone())) {
                Ok(paths) => written.extend(paths),
                Err(e) => {
                    error!("report for turn {} failed: {}", turn, e);
                    failed += 1;
                }
            }
            turn_progress.finish_and_clear();
            progress.remove(&turn_progress);
        }
        report_progress.finish_with_message("Reports generated");
        if failed > 0 {
            warn!("{} of {} reports failed", failed, self.config.report_turns.len());
        }
        written
    }

    /// Generates the report covering turns `0..=turn` in every configured
    /// format.
    pub fn generate_report_for_turn(&self, turn: Turn) -> Result<Vec<PathBuf>, ReportError> {
        self.generate(turn, None)
    }

    fn generate(
        &self,
        turn: Turn,
        progress: Option<ProgressBar>,
    ) -> Result<Vec<PathBuf>, ReportError> {
        let mut pipeline = MetricsPipeline::new(
            &self.accessor,
            self.saves.as_ref(),
            &self.ruleset,
            self.username.clone(),
        );
        if let Some(progress) = progress {
            pipeline = pipeline.with_progress(progress);
        }
        let report = pipeline.collect(0, turn)?;
        let mut written = Vec::new();
        for format in &self.config.formats {
            let path = match format {
                Format::Json => {
                    let path = self
                        .config
                        .output_dir
                        .join(format!("turn_{:03}_data.json", turn));
                    write_world_data(&report, &path)?;
                    path
                }
                Format::Csv => {
                    let path = self
                        .config
                        .output_dir
                        .join(format!("turn_{:03}_time_series.csv", turn));
                    write_time_series_csv(&report.time_series, &path)?;
                    path
                }
            };
            written.push(path);
        }
        Ok(written)
    }
}
