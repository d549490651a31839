//! Typed schemas for the six crash tables.
//!
//! Every table declares the columns the analyses read. Loading checks that
//! each declared column exists and casts it to its declared type, so a
//! misnamed column fails at load time with a [`CrashError::MissingColumn`]
//! instead of surfacing halfway through a query.

use crate::config::InputPaths;
use crate::prelude::*;
use crate::sources::CsvSource;
use arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::logical_expr::{cast, ident, try_cast, Expr};
use std::fmt;
use tracing::{info, instrument};

/// Join key shared by every table.
pub const CRASH_ID: &str = "CRASH_ID";

/// Column names of the Primary Person table.
pub mod person {
    pub const GENDER: &str = "PRSN_GNDR_ID";
    pub const ETHNICITY: &str = "PRSN_ETHNICITY_ID";
    pub const LICENSE_STATE: &str = "DRVR_LIC_STATE_ID";
    pub const ZIP: &str = "DRVR_ZIP";
    pub const LICENSE_TYPE: &str = "DRVR_LIC_TYPE_ID";
}

/// Column names of the Units table.
pub mod unit {
    pub const BODY_STYLE: &str = "VEH_BODY_STYL_ID";
    pub const MAKE: &str = "VEH_MAKE_ID";
    pub const INJURY_COUNT: &str = "TOT_INJRY_CNT";
    pub const DEATH_COUNT: &str = "DEATH_CNT";
    pub const CONTRIB_FACTOR_1: &str = "CONTRIB_FACTR_1_ID";
    pub const CONTRIB_FACTOR_2: &str = "CONTRIB_FACTR_2_ID";
    pub const DAMAGE_SCALE_1: &str = "VEH_DMAG_SCL_1_ID";
    pub const DAMAGE_SCALE_2: &str = "VEH_DMAG_SCL_2_ID";
    pub const FIN_RESP_TYPE: &str = "FIN_RESP_TYPE_ID";
    pub const LICENSE_STATE: &str = "VEH_LIC_STATE_ID";
    pub const COLOR: &str = "VEH_COLOR_ID";
}

/// Column names of the Damages table.
pub mod damage {
    pub const DAMAGED_PROPERTY: &str = "DAMAGED_PROPERTY";
}

/// Column names of the Charges table.
pub mod charge {
    pub const CHARGE: &str = "CHARGE";
}

/// How a declared column is typed after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Crash identifier; compared for equality only, held as text
    Key,
    /// Categorical label compared against literal strings
    Text,
    /// Non-negative tally; non-numeric entries load as null
    Count,
}

impl ColumnKind {
    fn conform(self, name: &str) -> Expr {
        match self {
            ColumnKind::Key | ColumnKind::Text => cast(ident(name), DataType::Utf8).alias(name),
            ColumnKind::Count => try_cast(ident(name), DataType::Int64).alias(name),
        }
    }
}

/// A column the analyses depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn key(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Key,
    }
}

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Text,
    }
}

const fn count(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Count,
    }
}

const PERSON_COLUMNS: &[ColumnSpec] = &[
    key(CRASH_ID),
    text(person::GENDER),
    text(person::ETHNICITY),
    text(person::LICENSE_STATE),
    text(person::ZIP),
    text(person::LICENSE_TYPE),
];

const UNIT_COLUMNS: &[ColumnSpec] = &[
    key(CRASH_ID),
    text(unit::BODY_STYLE),
    text(unit::MAKE),
    count(unit::INJURY_COUNT),
    count(unit::DEATH_COUNT),
    text(unit::CONTRIB_FACTOR_1),
    text(unit::CONTRIB_FACTOR_2),
    text(unit::DAMAGE_SCALE_1),
    text(unit::DAMAGE_SCALE_2),
    text(unit::FIN_RESP_TYPE),
    text(unit::LICENSE_STATE),
    text(unit::COLOR),
];

const DAMAGE_COLUMNS: &[ColumnSpec] = &[key(CRASH_ID), text(damage::DAMAGED_PROPERTY)];

const CHARGE_COLUMNS: &[ColumnSpec] = &[key(CRASH_ID), text(charge::CHARGE)];

const KEY_ONLY: &[ColumnSpec] = &[key(CRASH_ID)];

/// The six tables of the crash dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashTable {
    Charges,
    Damages,
    Endorsements,
    PrimaryPerson,
    Restrictions,
    Units,
}

impl CrashTable {
    /// All tables in load order.
    pub const ALL: [CrashTable; 6] = [
        CrashTable::Charges,
        CrashTable::Damages,
        CrashTable::Endorsements,
        CrashTable::PrimaryPerson,
        CrashTable::Restrictions,
        CrashTable::Units,
    ];

    /// Name the table is registered under in the session.
    pub fn table_name(self) -> &'static str {
        match self {
            CrashTable::Charges => "charges",
            CrashTable::Damages => "damages",
            CrashTable::Endorsements => "endorsements",
            CrashTable::PrimaryPerson => "primary_person",
            CrashTable::Restrictions => "restrictions",
            CrashTable::Units => "units",
        }
    }

    /// Key of the table's location in the settings file.
    pub fn config_key(self) -> &'static str {
        match self {
            CrashTable::Charges => "Charges_use",
            CrashTable::Damages => "Damages_use",
            CrashTable::Endorsements => "Endorse_use",
            CrashTable::PrimaryPerson => "Primary_Person_use",
            CrashTable::Restrictions => "Restrict_use",
            CrashTable::Units => "Units_use",
        }
    }

    /// Columns that must be present after loading.
    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            CrashTable::Charges => CHARGE_COLUMNS,
            CrashTable::Damages => DAMAGE_COLUMNS,
            CrashTable::Endorsements | CrashTable::Restrictions => KEY_ONLY,
            CrashTable::PrimaryPerson => PERSON_COLUMNS,
            CrashTable::Units => UNIT_COLUMNS,
        }
    }

    fn spec_for(self, column: &str) -> Option<&'static ColumnSpec> {
        self.columns().iter().find(|spec| spec.name == column)
    }
}

impl fmt::Display for CrashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Checks and types a freshly loaded frame against its table schema.
///
/// Declared columns are cast to their [`ColumnKind`]; all other columns pass
/// through untouched so whole-row deduplication still sees them.
pub fn conform(table: CrashTable, frame: DataFrame) -> Result<DataFrame> {
    let present: Vec<String> = frame
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();

    if let Some(missing) = table
        .columns()
        .iter()
        .find(|spec| !present.iter().any(|name| name == spec.name))
    {
        return Err(CrashError::missing_column(table.table_name(), missing.name));
    }

    let projection: Vec<Expr> = present
        .iter()
        .map(|name| match table.spec_for(name) {
            Some(spec) => spec.kind.conform(name),
            None => ident(name.as_str()).alias(name.as_str()),
        })
        .collect();

    Ok(frame.select(projection)?)
}

/// The six conformed tables of one crash dataset snapshot.
#[derive(Debug, Clone)]
pub struct CrashTables {
    pub charges: DataFrame,
    pub damages: DataFrame,
    pub endorsements: DataFrame,
    pub primary_person: DataFrame,
    pub restrictions: DataFrame,
    pub units: DataFrame,
}

impl CrashTables {
    /// Registers every configured input with the context and conforms it.
    #[instrument(skip(ctx, inputs))]
    pub async fn load(ctx: &mut CrashContext, inputs: &InputPaths) -> Result<Self> {
        for table in CrashTable::ALL {
            let location = inputs.location(table)?;
            let source = CsvSource::from_location(location).await?;
            ctx.register_source(table.table_name(), &source).await?;
        }

        let tables = Self::from_context(ctx).await?;
        info!("Loaded {} crash tables", CrashTable::ALL.len());
        Ok(tables)
    }

    /// Conforms tables that are already registered under their table names.
    pub async fn from_context(ctx: &CrashContext) -> Result<Self> {
        let load = |table: CrashTable| async move {
            let frame = ctx.table(table.table_name()).await?;
            conform(table, frame)
        };

        Ok(Self {
            charges: load(CrashTable::Charges).await?,
            damages: load(CrashTable::Damages).await?,
            endorsements: load(CrashTable::Endorsements).await?,
            primary_person: load(CrashTable::PrimaryPerson).await?,
            restrictions: load(CrashTable::Restrictions).await?,
            units: load(CrashTable::Units).await?,
        })
    }
}
