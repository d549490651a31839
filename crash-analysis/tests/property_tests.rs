//! Property-based tests for the counting analyses.
//!
//! Each property builds a random crash dataset, computes the expected answer
//! directly from the generated rows, and compares it with the analysis.

mod common;

use common::{load, target, CrashFixture, MemorySink, Person, Unit};
use proptest::prelude::*;
use std::collections::HashSet;

const GENDERS: [&str; 3] = ["MALE", "FEMALE", "UNKNOWN"];

const DAMAGE_SCALES: [&str; 7] = [
    "DAMAGED 1",
    "DAMAGED 4",
    "DAMAGED 5",
    "DAMAGED 7 HIGHEST",
    "NO DAMAGE",
    "NA",
    "INVALID VALUE",
];

const DAMAGED_PROPERTY: [&str; 2] = ["NONE", "FENCE"];

const INSURED: &str = "PROOF OF LIABILITY INSURANCE";

fn qualifies(scale: &str) -> bool {
    scale > "DAMAGED 4" && !["NA", "NO DAMAGE", "INVALID VALUE"].contains(&scale)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Duplicate person rows never inflate the male count.
    #[test]
    fn test_killed_male_count_ignores_duplicates(
        rows in prop::collection::vec((1u32..6, 0usize..GENDERS.len()), 0..30)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = rows.iter().fold(CrashFixture::new(), |fixture, &(crash_id, gender)| {
                fixture.person(Person {
                    crash_id,
                    gender: GENDERS[gender],
                    ..Default::default()
                })
            });
            let expected: HashSet<u32> = rows
                .iter()
                .filter(|(_, gender)| GENDERS[*gender] == "MALE")
                .map(|(crash_id, _)| *crash_id)
                .collect();

            let sink = MemorySink::new();
            let loaded = load(&fixture, sink.clone()).await;
            let count = loaded
                .analysis
                .killed_male_count(&target("males"))
                .await
                .unwrap();

            prop_assert_eq!(count, expected.len());
            prop_assert_eq!(sink.rows("males"), expected.len());
            Ok(())
        })?;
    }

    /// Deduplicating an already deduplicated table changes nothing.
    #[test]
    fn test_distinct_is_idempotent(
        rows in prop::collection::vec((1u32..4, 1u32..3, 0usize..GENDERS.len()), 0..25)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = rows.iter().fold(
                CrashFixture::new(),
                |fixture, &(crash_id, unit_nbr, gender)| {
                    fixture.person(Person {
                        crash_id,
                        unit_nbr,
                        gender: GENDERS[gender],
                        ..Default::default()
                    })
                },
            );
            let expected: HashSet<_> = rows.iter().collect();

            let loaded = load(&fixture, MemorySink::new()).await;
            let persons = loaded.analysis.tables().primary_person.clone();
            let once = persons.distinct().unwrap();
            let twice = once.clone().distinct().unwrap();

            let once_rows = once.count().await.unwrap();
            prop_assert_eq!(once_rows, expected.len());
            prop_assert_eq!(twice.count().await.unwrap(), once_rows);
            Ok(())
        })?;
    }

    /// The insured no-damage count is the number of distinct crashes, while
    /// the written result keeps one row per qualifying unit.
    #[test]
    fn test_no_damage_count_is_distinct_crashes(
        units in prop::collection::vec(
            (1u32..6, 1u32..3, 0usize..DAMAGE_SCALES.len(), any::<bool>()),
            0..20
        ),
        damages in prop::collection::vec((1u32..6, 0usize..DAMAGED_PROPERTY.len()), 0..10)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut fixture = CrashFixture::new();
            for &(crash_id, unit_nbr, scale, insured) in &units {
                fixture = fixture.unit(Unit {
                    crash_id,
                    unit_nbr,
                    damage_1: DAMAGE_SCALES[scale],
                    fin_resp: if insured { INSURED } else { "NA" },
                    ..Default::default()
                });
            }
            for &(crash_id, property) in &damages {
                fixture = fixture.damage(crash_id, DAMAGED_PROPERTY[property]);
            }

            let undamaged: HashSet<u32> = damages
                .iter()
                .filter(|(_, property)| DAMAGED_PROPERTY[*property] == "NONE")
                .map(|(crash_id, _)| *crash_id)
                .collect();
            let qualifying_units: HashSet<_> = units
                .iter()
                .filter(|(crash_id, _, scale, insured)| {
                    *insured && qualifies(DAMAGE_SCALES[*scale]) && undamaged.contains(crash_id)
                })
                .collect();
            let expected_crashes: HashSet<u32> =
                qualifying_units.iter().map(|(crash_id, ..)| *crash_id).collect();

            let sink = MemorySink::new();
            let loaded = load(&fixture, sink.clone()).await;
            let count = loaded
                .analysis
                .no_damage_insured_count(&target("insured"))
                .await
                .unwrap();

            prop_assert_eq!(count, expected_crashes.len());
            prop_assert_eq!(sink.rows("insured"), qualifying_units.len());
            Ok(())
        })?;
    }
}

#[test]
fn test_damage_scale_compares_as_text() {
    assert!(qualifies("DAMAGED 5"));
    assert!(qualifies("DAMAGED 7 HIGHEST"));
    assert!(!qualifies("DAMAGED 4"));
    assert!(!qualifies("DAMAGED 10"));
    assert!(!qualifies("NO DAMAGE"));
}
