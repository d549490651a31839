//! Shared fixtures for the integration tests.
//!
//! `CrashFixture` writes the six crash tables as CSV files into a temporary
//! directory; `MemorySink` captures what each analysis writes.

#![allow(dead_code)]

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use crash_analysis::analysis::CrashAnalysis;
use crash_analysis::config::InputPaths;
use crash_analysis::error::Result;
use crash_analysis::prelude::*;
use crash_analysis::schema::{CrashTable, CrashTables};
use crash_analysis::sink::{OutputFormat, OutputSink, OutputTarget};
use datafusion::dataframe::DataFrame;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PERSON_HEADER: &[&str] = &[
    "CRASH_ID",
    "UNIT_NBR",
    "PRSN_GNDR_ID",
    "PRSN_ETHNICITY_ID",
    "DRVR_LIC_STATE_ID",
    "DRVR_ZIP",
    "DRVR_LIC_TYPE_ID",
];

pub const UNIT_HEADER: &[&str] = &[
    "CRASH_ID",
    "UNIT_NBR",
    "VEH_BODY_STYL_ID",
    "VEH_MAKE_ID",
    "TOT_INJRY_CNT",
    "DEATH_CNT",
    "CONTRIB_FACTR_1_ID",
    "CONTRIB_FACTR_2_ID",
    "VEH_DMAG_SCL_1_ID",
    "VEH_DMAG_SCL_2_ID",
    "FIN_RESP_TYPE_ID",
    "VEH_LIC_STATE_ID",
    "VEH_COLOR_ID",
];

#[derive(Debug, Clone)]
pub struct Person {
    pub crash_id: u32,
    pub unit_nbr: u32,
    pub gender: &'static str,
    pub ethnicity: &'static str,
    pub license_state: &'static str,
    pub zip: Option<&'static str>,
    pub license_type: &'static str,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            crash_id: 1,
            unit_nbr: 1,
            gender: "MALE",
            ethnicity: "WHITE",
            license_state: "Texas",
            zip: Some("76010"),
            license_type: "DRIVER LICENSE",
        }
    }
}

impl Person {
    fn row(&self) -> Vec<String> {
        vec![
            self.crash_id.to_string(),
            self.unit_nbr.to_string(),
            self.gender.to_string(),
            self.ethnicity.to_string(),
            self.license_state.to_string(),
            self.zip.unwrap_or_default().to_string(),
            self.license_type.to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub crash_id: u32,
    pub unit_nbr: u32,
    pub body_style: &'static str,
    pub make: &'static str,
    pub injuries: &'static str,
    pub deaths: &'static str,
    pub factor_1: &'static str,
    pub factor_2: &'static str,
    pub damage_1: &'static str,
    pub damage_2: &'static str,
    pub fin_resp: &'static str,
    pub license_state: &'static str,
    pub color: &'static str,
}

impl Default for Unit {
    fn default() -> Self {
        Self {
            crash_id: 1,
            unit_nbr: 1,
            body_style: "PASSENGER CAR, 4-DOOR",
            make: "FORD",
            injuries: "0",
            deaths: "0",
            factor_1: "NONE",
            factor_2: "NA",
            damage_1: "NA",
            damage_2: "NA",
            fin_resp: "NA",
            license_state: "TX",
            color: "BLK",
        }
    }
}

impl Unit {
    fn row(&self) -> Vec<String> {
        let mut row = vec![self.crash_id.to_string(), self.unit_nbr.to_string()];
        row.extend(
            [
                self.body_style,
                self.make,
                self.injuries,
                self.deaths,
                self.factor_1,
                self.factor_2,
                self.damage_1,
                self.damage_2,
                self.fin_resp,
                self.license_state,
                self.color,
            ]
            .map(str::to_string),
        );
        row
    }
}

/// Builder for a crash dataset written to disk as CSV.
#[derive(Debug, Default)]
pub struct CrashFixture {
    pub persons: Vec<Person>,
    pub units: Vec<Unit>,
    pub damages: Vec<(u32, &'static str)>,
    pub charges: Vec<(u32, &'static str)>,
    pub endorsements: Vec<(u32, &'static str)>,
    pub restrictions: Vec<(u32, &'static str)>,
}

impl CrashFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn person(mut self, person: Person) -> Self {
        self.persons.push(person);
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn damage(mut self, crash_id: u32, property: &'static str) -> Self {
        self.damages.push((crash_id, property));
        self
    }

    pub fn charge(mut self, crash_id: u32, charge: &'static str) -> Self {
        self.charges.push((crash_id, charge));
        self
    }

    /// Writes every table into `dir` and returns their locations.
    pub fn write_to(&self, dir: &Path) -> InputPaths {
        let pairs = |rows: &[(u32, &'static str)]| -> Vec<Vec<String>> {
            rows.iter()
                .map(|(id, value)| vec![id.to_string(), value.to_string()])
                .collect()
        };

        let tables: Vec<(CrashTable, Vec<&str>, Vec<Vec<String>>)> = vec![
            (
                CrashTable::PrimaryPerson,
                PERSON_HEADER.to_vec(),
                self.persons.iter().map(Person::row).collect(),
            ),
            (
                CrashTable::Units,
                UNIT_HEADER.to_vec(),
                self.units.iter().map(Unit::row).collect(),
            ),
            (
                CrashTable::Damages,
                vec!["CRASH_ID", "DAMAGED_PROPERTY"],
                pairs(&self.damages),
            ),
            (
                CrashTable::Charges,
                vec!["CRASH_ID", "CHARGE"],
                pairs(&self.charges),
            ),
            (
                CrashTable::Endorsements,
                vec!["CRASH_ID", "DRVR_LIC_ENDORS_ID"],
                pairs(&self.endorsements),
            ),
            (
                CrashTable::Restrictions,
                vec!["CRASH_ID", "DRVR_LIC_RESTRIC_ID"],
                pairs(&self.restrictions),
            ),
        ];

        let mut inputs = InputPaths::default();
        for (table, header, rows) in tables {
            let path = dir.join(format!("{}.csv", table.config_key()));
            std::fs::write(&path, to_csv(&header, &rows)).unwrap();
            inputs.insert(table, path.to_str().unwrap());
        }
        inputs
    }
}

fn to_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let quote = |field: &str| {
        if field.contains(',') {
            format!("\"{field}\"")
        } else {
            field.to_string()
        }
    };

    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        let fields: Vec<String> = row.iter().map(|field| quote(field.as_str())).collect();
        writeln!(out, "{}", fields.join(",")).unwrap();
    }
    out
}

/// Captures the result each analysis writes, keyed by destination path.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<HashMap<String, Vec<RecordBatch>>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self, path: &str) -> Vec<RecordBatch> {
        self.written
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn rows(&self, path: &str) -> usize {
        self.batches(path).iter().map(RecordBatch::num_rows).sum()
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, frame: DataFrame, target: &OutputTarget) -> Result<()> {
        let batches = frame.collect().await?;
        self.written
            .lock()
            .unwrap()
            .insert(target.path.clone(), batches);
        Ok(())
    }
}

/// A loaded dataset. The context is kept alive alongside the engine.
pub struct Loaded {
    pub dir: TempDir,
    pub ctx: CrashContext,
    pub analysis: CrashAnalysis,
}

pub async fn load(fixture: &CrashFixture, sink: Arc<dyn OutputSink>) -> Loaded {
    let dir = TempDir::new().unwrap();
    let inputs = fixture.write_to(dir.path());

    let mut ctx = CrashContext::new().unwrap();
    let tables = CrashTables::load(&mut ctx, &inputs).await.unwrap();
    Loaded {
        dir,
        ctx,
        analysis: CrashAnalysis::new(tables, sink),
    }
}

pub fn target(path: &str) -> OutputTarget {
    OutputTarget::new(path, OutputFormat::Parquet)
}
