//! Runs the analyses in their fixed order and reports each summary.

use super::engine::CrashAnalysis;
use crate::config::Settings;
use crate::prelude::*;
use crate::sink::OutputTarget;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::fmt;
use tracing::{error, info, info_span, Instrument};

/// The eight analyses, in the order a run performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    KilledMaleCount,
    TwoWheelerCount,
    TopFemaleState,
    MakeRank5To15,
    TopEthnicPerBodyStyle,
    TopAlcoholZips,
    NoDamageInsuredCount,
    TopSpeedingBrands,
}

impl Analysis {
    /// All analyses in run order.
    pub const ALL: [Analysis; 8] = [
        Analysis::KilledMaleCount,
        Analysis::TwoWheelerCount,
        Analysis::TopFemaleState,
        Analysis::MakeRank5To15,
        Analysis::TopEthnicPerBodyStyle,
        Analysis::TopAlcoholZips,
        Analysis::NoDamageInsuredCount,
        Analysis::TopSpeedingBrands,
    ];

    /// Short identifier used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Analysis::KilledMaleCount => "killed-male-count",
            Analysis::TwoWheelerCount => "two-wheeler-count",
            Analysis::TopFemaleState => "top-female-state",
            Analysis::MakeRank5To15 => "make-rank-5-to-15",
            Analysis::TopEthnicPerBodyStyle => "top-ethnic-per-bodystyle",
            Analysis::TopAlcoholZips => "top-5-alcohol-zip",
            Analysis::NoDamageInsuredCount => "no-damage-insured-count",
            Analysis::TopSpeedingBrands => "top-5-speeding-brands",
        }
    }

    /// Heading printed next to the summary.
    pub fn label(self) -> &'static str {
        match self {
            Analysis::KilledMaleCount => "Number of persons killed who are male",
            Analysis::TwoWheelerCount => "Number of two-wheelers booked for crashes",
            Analysis::TopFemaleState => "State with the most crashes involving females",
            Analysis::MakeRank5To15 => "5th to 15th vehicle makes by injuries including death",
            Analysis::TopEthnicPerBodyStyle => "Top ethnic user group of each body style",
            Analysis::TopAlcoholZips => "Top 5 zip codes with alcohol as a contributing factor",
            Analysis::NoDamageInsuredCount => {
                "Distinct insured crashes above damage level 4 with no damaged property"
            }
            Analysis::TopSpeedingBrands => "Top 5 vehicle makes charged with speeding",
        }
    }

    /// Key of this analysis' destination in `OUTPUT_FILE_PATH`.
    pub fn output_key(self) -> &'static str {
        match self {
            Analysis::KilledMaleCount => "Path1",
            Analysis::TwoWheelerCount => "Path2",
            Analysis::TopFemaleState => "Path3",
            Analysis::MakeRank5To15 => "Path4",
            Analysis::TopEthnicPerBodyStyle => "Path5",
            Analysis::TopAlcoholZips => "Path6",
            Analysis::NoDamageInsuredCount => "Path7",
            Analysis::TopSpeedingBrands => "Path8",
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value an analysis reports once its result is written.
#[derive(Debug, Clone)]
pub enum Summary {
    Count(usize),
    Label(Option<String>),
    Labels(Vec<String>),
    Table(Vec<RecordBatch>),
}

impl Summary {
    /// Number of rows in a `Table` summary; zero otherwise.
    pub fn table_rows(&self) -> usize {
        match self {
            Summary::Table(batches) => batches.iter().map(RecordBatch::num_rows).sum(),
            _ => 0,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::Count(count) => write!(f, "{count}"),
            Summary::Label(Some(label)) => f.write_str(label),
            Summary::Label(None) => f.write_str("<none>"),
            Summary::Labels(labels) => write!(f, "[{}]", labels.join(", ")),
            Summary::Table(batches) => {
                let grid = pretty_format_batches(batches).map_err(|_| fmt::Error)?;
                write!(f, "\n{grid}")
            }
        }
    }
}

/// Drives the analyses against their configured destinations.
#[derive(Debug)]
pub struct AnalysisRunner {
    engine: CrashAnalysis,
    targets: Vec<(Analysis, OutputTarget)>,
}

impl AnalysisRunner {
    /// Resolves every analysis' destination up front so a bad setting fails
    /// before any query runs.
    pub fn new(engine: CrashAnalysis, settings: &Settings) -> Result<Self> {
        let targets = Analysis::ALL
            .iter()
            .map(|&analysis| {
                settings
                    .output_target(analysis)
                    .map(|target| (analysis, target))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { engine, targets })
    }

    /// Creates a runner with explicit destinations.
    pub fn with_targets(engine: CrashAnalysis, targets: Vec<(Analysis, OutputTarget)>) -> Self {
        Self { engine, targets }
    }

    fn target(&self, analysis: Analysis) -> Result<&OutputTarget> {
        self.targets
            .iter()
            .find(|(candidate, _)| *candidate == analysis)
            .map(|(_, target)| target)
            .ok_or_else(|| {
                CrashError::Configuration(format!("No output target for analysis '{analysis}'"))
            })
    }

    /// Runs one analysis. Failures carry the analysis name.
    pub async fn run(&self, analysis: Analysis) -> Result<Summary> {
        let span = info_span!("analysis", name = analysis.name());
        self.dispatch(analysis)
            .instrument(span)
            .await
            .map_err(|e| {
                error!(analysis = analysis.name(), error = %e, "Analysis failed");
                CrashError::analysis_failed(analysis.name(), e)
            })
    }

    async fn dispatch(&self, analysis: Analysis) -> Result<Summary> {
        let target = self.target(analysis)?;
        let engine = &self.engine;
        Ok(match analysis {
            Analysis::KilledMaleCount => Summary::Count(engine.killed_male_count(target).await?),
            Analysis::TwoWheelerCount => Summary::Count(engine.two_wheeler_count(target).await?),
            Analysis::TopFemaleState => Summary::Label(engine.top_female_state(target).await?),
            Analysis::MakeRank5To15 => Summary::Labels(engine.make_rank_5_to_15(target).await?),
            Analysis::TopEthnicPerBodyStyle => {
                Summary::Table(engine.top_ethnic_per_body_style(target).await?)
            }
            Analysis::TopAlcoholZips => Summary::Labels(engine.top_alcohol_zips(target).await?),
            Analysis::NoDamageInsuredCount => {
                Summary::Count(engine.no_damage_insured_count(target).await?)
            }
            Analysis::TopSpeedingBrands => {
                Summary::Labels(engine.top_speeding_brands(target).await?)
            }
        })
    }

    /// Runs every analysis in order, handing each summary to `on_summary` as
    /// soon as it is ready. Stops at the first failure.
    pub async fn run_all<F>(&self, mut on_summary: F) -> Result<Vec<(Analysis, Summary)>>
    where
        F: FnMut(Analysis, &Summary),
    {
        let mut summaries = Vec::with_capacity(Analysis::ALL.len());
        for analysis in Analysis::ALL {
            let summary = self.run(analysis).await?;
            on_summary(analysis, &summary);
            summaries.push((analysis, summary));
        }
        info!(analyses = summaries.len(), "All analyses complete");
        Ok(summaries)
    }
}
