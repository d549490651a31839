//! The eight crash analyses.
//!
//! Each analysis is a single forward pipeline over the loaded tables:
//! filter, join on CRASH_ID, aggregate, rank or limit. The result is
//! deduplicated, materialized once, written through the [`OutputSink`], and
//! summarized from the same materialization.

use super::frames::{
    by_count_desc, contains, count_rows, is_in, join_on_crash_id, not_in, select_exact,
    string_values, top_values, COUNT,
};
use crate::prelude::*;
use crate::schema::{charge, damage, person, unit, CrashTables, CRASH_ID};
use crate::sink::{OutputSink, OutputTarget};
use arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::sum;
use datafusion::functions_window::expr_fn::{dense_rank, rank};
use datafusion::logical_expr::{ident, lit, ExprFunctionExt, SortExpr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Summed injuries and deaths per vehicle make.
pub const TOTAL_CASUALTIES: &str = "TOTAL_CASUALTIES";

/// Window rank column added by the ranking analyses.
pub const RANK: &str = "RANK";

/// Dense-rank band reported by [`CrashAnalysis::make_rank_5_to_15`].
pub const MAKE_RANK_BAND: RangeInclusive<u64> = 5..=15;

const BODY_STYLE_EXCLUSIONS: &[&str] = &[
    "NA",
    "UNKNOWN",
    "NOT REPORTED",
    "OTHER  (EXPLAIN IN NARRATIVE)",
];

const ETHNICITY_EXCLUSIONS: &[&str] = &["NA", "UNKNOWN"];

const DAMAGE_SCALE_EXCLUSIONS: &[&str] = &["NA", "NO DAMAGE", "INVALID VALUE"];

/// Damage labels are compared as strings, so "DAMAGED 5" qualifies while
/// "DAMAGED 10" does not.
const DAMAGE_SCALE_FLOOR: &str = "DAMAGED 4";

const LIABILITY_INSURANCE: &str = "PROOF OF LIABILITY INSURANCE";

const LICENSED_DRIVER_TYPES: &[&str] = &["DRIVER LICENSE", "COMMERCIAL DRIVER LIC."];

const TOP_LICENSE_STATES: usize = 25;
const TOP_VEHICLE_COLORS: usize = 10;
const TOP_RESULTS: usize = 5;

/// Read-only queries over one snapshot of the crash tables.
///
/// # Examples
///
/// ```rust,no_run
/// use crash_analysis::analysis::CrashAnalysis;
/// use crash_analysis::config::Settings;
/// use crash_analysis::core::CrashContext;
/// use crash_analysis::schema::CrashTables;
/// use crash_analysis::sink::{FileSink, OutputFormat, OutputTarget};
/// use std::sync::Arc;
///
/// # async fn example(settings: Settings) -> crash_analysis::error::Result<()> {
/// let mut ctx = CrashContext::new()?;
/// let tables = CrashTables::load(&mut ctx, &settings.inputs).await?;
/// let analysis = CrashAnalysis::new(tables, Arc::new(FileSink::new()));
///
/// let target = OutputTarget::new("Output/1", OutputFormat::Parquet);
/// println!("{}", analysis.killed_male_count(&target).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CrashAnalysis {
    tables: CrashTables,
    sink: Arc<dyn OutputSink>,
}

impl CrashAnalysis {
    pub fn new(tables: CrashTables, sink: Arc<dyn OutputSink>) -> Self {
        Self { tables, sink }
    }

    /// The tables this engine reads.
    pub fn tables(&self) -> &CrashTables {
        &self.tables
    }

    /// Deduplicates and materializes `frame`, then writes it to `target`.
    ///
    /// The written copy is sorted by `ordering` when one is given. The
    /// returned frame is the unsorted materialization; callers sort again
    /// for their summaries.
    async fn persist(
        &self,
        frame: DataFrame,
        ordering: Vec<SortExpr>,
        target: &OutputTarget,
    ) -> Result<DataFrame> {
        let result = frame.distinct()?.cache().await?;

        let written = if ordering.is_empty() {
            result.clone()
        } else {
            result.clone().sort(ordering)?
        };
        self.sink.write(written, target).await?;

        Ok(result)
    }

    /// Person records whose gender is MALE. Returns the number of distinct rows.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn killed_male_count(&self, target: &OutputTarget) -> Result<usize> {
        let males = self
            .tables
            .primary_person
            .clone()
            .filter(ident(person::GENDER).eq(lit("MALE")))?;

        let result = self.persist(males, Vec::new(), target).await?;
        let count = result.count().await?;

        info!(rows = count, "Counted male persons");
        Ok(count)
    }

    /// Units whose body style mentions MOTORCYCLE. Returns the number of
    /// distinct rows.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn two_wheeler_count(&self, target: &OutputTarget) -> Result<usize> {
        let two_wheelers = self
            .tables
            .units
            .clone()
            .filter(contains(unit::BODY_STYLE, "MOTORCYCLE"))?;

        let result = self.persist(two_wheelers, Vec::new(), target).await?;
        let count = result.count().await?;

        info!(rows = count, "Counted two-wheeler units");
        Ok(count)
    }

    /// Driver license state with the most FEMALE person records.
    ///
    /// States with equal counts are ordered by name, so a tie reports the
    /// alphabetically first state rather than the first one read. Returns
    /// `None` when no female records exist.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn top_female_state(&self, target: &OutputTarget) -> Result<Option<String>> {
        let by_state = self
            .tables
            .primary_person
            .clone()
            .filter(ident(person::GENDER).eq(lit("FEMALE")))?
            .aggregate(vec![ident(person::LICENSE_STATE)], vec![count_rows()])?;

        let ordering = by_count_desc(person::LICENSE_STATE);
        let result = self.persist(by_state, ordering.clone(), target).await?;

        let top = result.sort(ordering)?.limit(0, Some(1))?.collect().await?;
        let state = string_values(&top, person::LICENSE_STATE)?
            .into_iter()
            .next()
            .flatten();

        info!(state = ?state, "Found state with most female records");
        Ok(state)
    }

    /// Vehicle makes ranked 5th through 15th by total casualties.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn make_rank_5_to_15(&self, target: &OutputTarget) -> Result<Vec<String>> {
        self.makes_in_casualty_rank_band(MAKE_RANK_BAND, target)
            .await
    }

    /// Vehicle makes whose dense rank by total casualties (injuries plus
    /// deaths, largest first) lies inside `band`, ordered by rank then make.
    pub async fn makes_in_casualty_rank_band(
        &self,
        band: RangeInclusive<u64>,
        target: &OutputTarget,
    ) -> Result<Vec<String>> {
        let casualties = self
            .tables
            .units
            .clone()
            .filter(ident(unit::MAKE).not_eq(lit("NA")))?
            .with_column(
                TOTAL_CASUALTIES,
                ident(unit::INJURY_COUNT) + ident(unit::DEATH_COUNT),
            )?
            .aggregate(
                vec![ident(unit::MAKE)],
                vec![sum(ident(TOTAL_CASUALTIES)).alias(TOTAL_CASUALTIES)],
            )?;

        let casualty_rank = dense_rank()
            .order_by(vec![ident(TOTAL_CASUALTIES).sort(false, false)])
            .build()?
            .alias(RANK);

        let in_band = casualties
            .window(vec![casualty_rank])?
            .filter(ident(RANK).between(lit(*band.start()), lit(*band.end())))?;

        let ordering = vec![ident(RANK).sort(true, false), ident(unit::MAKE).sort(true, false)];
        let result = self.persist(in_band, ordering.clone(), target).await?;

        let rows = result.sort(ordering)?.collect().await?;
        let makes: Vec<String> = string_values(&rows, unit::MAKE)?
            .into_iter()
            .flatten()
            .collect();

        info!(makes = makes.len(), band = ?band, "Ranked vehicle makes by casualties");
        Ok(makes)
    }

    /// Most common ethnicity for each vehicle body style.
    ///
    /// Uses ordinary rank within each body style, so tied ethnicities all
    /// appear. Rows are ordered by body style, then ethnicity.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn top_ethnic_per_body_style(
        &self,
        target: &OutputTarget,
    ) -> Result<Vec<RecordBatch>> {
        let persons = self
            .tables
            .primary_person
            .clone()
            .filter(not_in(person::ETHNICITY, ETHNICITY_EXCLUSIONS))?;
        let units = self
            .tables
            .units
            .clone()
            .filter(not_in(unit::BODY_STYLE, BODY_STYLE_EXCLUSIONS))?;

        let counts = join_on_crash_id(persons, units, "units")?.aggregate(
            vec![ident(person::ETHNICITY), ident(unit::BODY_STYLE)],
            vec![count_rows()],
        )?;

        let ethnicity_rank = rank()
            .partition_by(vec![ident(unit::BODY_STYLE)])
            .order_by(vec![ident(COUNT).sort(false, false)])
            .build()?
            .alias(RANK);

        let top = counts
            .window(vec![ethnicity_rank])?
            .filter(ident(RANK).eq(lit(1_u64)))?;

        let ordering = vec![
            ident(unit::BODY_STYLE).sort(true, false),
            ident(person::ETHNICITY).sort(true, false),
        ];
        let result = self.persist(top, ordering.clone(), target).await?;
        let rows = result.sort(ordering)?.collect().await?;

        debug!(
            rows = rows.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "Ranked ethnicities per body style"
        );
        Ok(rows)
    }

    /// The five driver zip codes with the most joined person/unit records
    /// where alcohol was a contributing factor.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn top_alcohol_zips(&self, target: &OutputTarget) -> Result<Vec<String>> {
        let units = self.tables.units.clone().filter(
            contains(unit::CONTRIB_FACTOR_1, "ALCOHOL")
                .or(contains(unit::CONTRIB_FACTOR_2, "ALCOHOL")),
        )?;
        let persons = self
            .tables
            .primary_person
            .clone()
            .filter(ident(person::ZIP).is_not_null())?;

        let ordering = by_count_desc(person::ZIP);
        let top = join_on_crash_id(persons, units, "units")?
            .aggregate(vec![ident(person::ZIP)], vec![count_rows()])?
            .sort(ordering.clone())?
            .limit(0, Some(TOP_RESULTS))?;

        let result = self.persist(top, ordering.clone(), target).await?;
        let rows = result.sort(ordering)?.collect().await?;
        let zips: Vec<String> = string_values(&rows, person::ZIP)?
            .into_iter()
            .flatten()
            .collect();

        info!(zips = ?zips, "Found top alcohol-related zip codes");
        Ok(zips)
    }

    /// Distinct crashes with an insured unit damaged above level 4 and a
    /// damages record of NONE.
    ///
    /// The written result keeps every joined row; the returned value counts
    /// distinct CRASH_IDs, not rows.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn no_damage_insured_count(&self, target: &OutputTarget) -> Result<usize> {
        let severe = |column: &str| {
            ident(column)
                .gt(lit(DAMAGE_SCALE_FLOOR))
                .and(not_in(column, DAMAGE_SCALE_EXCLUSIONS))
        };

        let units = self
            .tables
            .units
            .clone()
            .filter(severe(unit::DAMAGE_SCALE_1).or(severe(unit::DAMAGE_SCALE_2)))?
            .filter(ident(unit::FIN_RESP_TYPE).eq(lit(LIABILITY_INSURANCE)))?;
        let damages = self
            .tables
            .damages
            .clone()
            .filter(ident(damage::DAMAGED_PROPERTY).eq(lit("NONE")))?;

        let joined = join_on_crash_id(units, damages, "damages")?;
        let result = self.persist(joined, Vec::new(), target).await?;

        let crashes = select_exact(result, &[CRASH_ID])?.distinct()?.count().await?;

        info!(crashes, "Counted insured crashes without property damage");
        Ok(crashes)
    }

    /// The five vehicle makes with the most speeding charges among licensed
    /// drivers, restricted to the 25 most common license states and the 10
    /// most common vehicle colours.
    #[instrument(skip(self), fields(output.path = %target.path))]
    pub async fn top_speeding_brands(&self, target: &OutputTarget) -> Result<Vec<String>> {
        let units = &self.tables.units;
        let states = top_values(units.clone(), unit::LICENSE_STATE, TOP_LICENSE_STATES).await?;
        let colors = top_values(units.clone(), unit::COLOR, TOP_VEHICLE_COLORS).await?;
        debug!(states = states.len(), colors = colors.len(), "Selected top states and colours");

        let units = units
            .clone()
            .filter(is_in(unit::LICENSE_STATE, &states).and(is_in(unit::COLOR, &colors)))?;
        let charges = self
            .tables
            .charges
            .clone()
            .filter(contains(charge::CHARGE, "SPEED"))?;
        let licensed: Vec<String> = LICENSED_DRIVER_TYPES.iter().map(|t| t.to_string()).collect();
        let persons = self
            .tables
            .primary_person
            .clone()
            .filter(is_in(person::LICENSE_TYPE, &licensed))?;

        let joined = join_on_crash_id(
            join_on_crash_id(units, charges, "charges")?,
            persons,
            "primary_person",
        )?;

        let ordering = by_count_desc(unit::MAKE);
        let top = joined
            .aggregate(vec![ident(unit::MAKE)], vec![count_rows()])?
            .sort(ordering.clone())?
            .limit(0, Some(TOP_RESULTS))?;

        let result = self.persist(top, ordering.clone(), target).await?;
        let rows = result.sort(ordering)?.collect().await?;
        let makes: Vec<String> = string_values(&rows, unit::MAKE)?
            .into_iter()
            .flatten()
            .collect();

        info!(makes = ?makes, "Found top speeding vehicle makes");
        Ok(makes)
    }
}
