use crate::error::{HuntOddsError, Result};
use crate::models::{EligibilityTag, HuntRecord, WeaponCode};
use crate::odds;
use crate::store::HuntRecordStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// One filter/sort request over the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntQuery {
    /// Case-sensitive prefix of the hunt code; empty matches everything.
    pub species_prefix: String,
    pub weapon: WeaponCode,
    pub remove_private_land: bool,
    pub remove_youth_only: bool,
    pub remove_mobility_impaired: bool,
    pub remove_military_only: bool,
    /// Highest odds first when set, otherwise ascending hunt code.
    pub sort_by_odds: bool,
}

impl Default for HuntQuery {
    fn default() -> Self {
        Self {
            species_prefix: "ANT".to_string(),
            weapon: WeaponCode::AnyLegal,
            remove_private_land: true,
            remove_youth_only: true,
            remove_mobility_impaired: true,
            remove_military_only: true,
            sort_by_odds: true,
        }
    }
}

impl HuntQuery {
    pub fn new(species_prefix: impl Into<String>, weapon: WeaponCode) -> Self {
        Self {
            species_prefix: species_prefix.into(),
            weapon,
            ..Self::default()
        }
    }

    pub fn removes(&self, tag: EligibilityTag) -> bool {
        match tag {
            EligibilityTag::PrivateLand => self.remove_private_land,
            EligibilityTag::YouthOnly => self.remove_youth_only,
            EligibilityTag::MobilityImpaired => self.remove_mobility_impaired,
            EligibilityTag::MilitaryOnly => self.remove_military_only,
        }
    }

    pub fn set_removal(&mut self, tag: EligibilityTag, remove: bool) {
        let switch = match tag {
            EligibilityTag::PrivateLand => &mut self.remove_private_land,
            EligibilityTag::YouthOnly => &mut self.remove_youth_only,
            EligibilityTag::MobilityImpaired => &mut self.remove_mobility_impaired,
            EligibilityTag::MilitaryOnly => &mut self.remove_military_only,
        };
        *switch = remove;
    }

    pub fn removed_tags(&self) -> Vec<EligibilityTag> {
        EligibilityTag::ALL
            .into_iter()
            .filter(|&tag| self.removes(tag))
            .collect()
    }

    /// Whether a record survives every filter of this query.
    pub fn matches(&self, record: &HuntRecord) -> bool {
        record.hunt_code.starts_with(&self.species_prefix)
            && record.weapon_digit() == Some(self.weapon.digit())
            && !EligibilityTag::ALL
                .into_iter()
                .any(|tag| self.removes(tag) && record.has_tag(tag))
    }
}

pub struct QueryEngine<'a> {
    store: &'a HuntRecordStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a HuntRecordStore) -> Self {
        Self { store }
    }

    /// Filtered and sorted copy of the store's records. An empty result is
    /// a normal answer.
    pub fn run(&self, query: &HuntQuery) -> Vec<HuntRecord> {
        let snapshot = self.store.snapshot();
        let mut results: Vec<HuntRecord> = snapshot
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();

        // Both sorts are stable, so equal odds keep store order.
        if query.sort_by_odds {
            results.sort_by(|a, b| {
                b.hunt_odds
                    .partial_cmp(&a.hunt_odds)
                    .unwrap_or(Ordering::Equal)
            });
        } else {
            results.sort_by(|a, b| a.hunt_code.cmp(&b.hunt_code));
        }

        debug!(
            species = %query.species_prefix,
            weapon = %query.weapon,
            scanned = snapshot.len(),
            matched = results.len(),
            "ran hunt query"
        );
        results
    }

    /// The chance line for a single hunt code, computed from the stored
    /// license and applicant counts.
    pub fn lookup(&self, hunt_code: &str) -> Result<String> {
        let code = hunt_code.trim();
        let record = self
            .store
            .find_by_code(code)
            .ok_or_else(|| HuntOddsError::CodeNotFound {
                code: code.to_string(),
            })?;
        let chance = odds::chance(record.n_licenses, record.r_tot)?;
        Ok(odds::describe_chance(code, chance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(code: &str, description: &str, hunt_odds: f64) -> HuntRecord {
        HuntRecord {
            hunt_code: code.to_string(),
            unit_description: description.to_string(),
            bag: "A".to_string(),
            n_licenses: 1,
            r1st: 0,
            r2nd: 0,
            r3rd: 0,
            r_tot: 1,
            hunt_odds,
        }
    }

    fn everything(species: &str, weapon: WeaponCode) -> HuntQuery {
        let mut query = HuntQuery::new(species, weapon);
        for tag in EligibilityTag::ALL {
            query.set_removal(tag, false);
        }
        query
    }

    #[test]
    fn youth_only_bow_hunt_is_filtered_out() {
        let store = HuntRecordStore::new(vec![record("ANT-2-050", "youth only", 50.0)]);
        let query = HuntQuery::new("ANT", WeaponCode::Bow);
        assert!(QueryEngine::new(&store).run(&query).is_empty());
    }

    #[test]
    fn filters_species_and_weapon() {
        let store = HuntRecordStore::new(vec![
            record("ANT-1-101", "Unit 2", 10.0),
            record("ANT-2-102", "Unit 2", 10.0),
            record("ELK-1-101", "Unit 2", 10.0),
            record("ANT", "short code", 10.0),
            record("ant-1-103", "lowercase", 10.0),
        ]);
        let results = QueryEngine::new(&store).run(&everything("ANT", WeaponCode::AnyLegal));
        let codes: Vec<_> = results.iter().map(|r| r.hunt_code.as_str()).collect();
        assert_eq!(codes, ["ANT-1-101"]);
    }

    #[test]
    fn empty_prefix_matches_every_species() {
        let store = HuntRecordStore::new(vec![
            record("ANT-3-101", "", 1.0),
            record("ELK-3-101", "", 2.0),
            record("DER-1-101", "", 3.0),
        ]);
        let results = QueryEngine::new(&store).run(&everything("", WeaponCode::MuzzleLoader));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].hunt_code, "ELK-3-101");
    }

    #[test]
    fn switches_remove_only_their_own_tag() {
        let store = HuntRecordStore::new(vec![
            record("DER-1-001", "Private Land Only", 1.0),
            record("DER-1-002", "YOUTH ONLY", 1.0),
            record("DER-1-003", "Mobility Impaired Only", 1.0),
            record("DER-1-004", "Military Only", 1.0),
            record("DER-1-005", "Unit 34", 1.0),
        ]);
        let engine = QueryEngine::new(&store);

        let mut query = everything("DER", WeaponCode::AnyLegal);
        query.set_removal(EligibilityTag::YouthOnly, true);
        query.set_removal(EligibilityTag::MilitaryOnly, true);
        query.sort_by_odds = false;

        let codes: Vec<_> = engine
            .run(&query)
            .into_iter()
            .map(|r| r.hunt_code)
            .collect();
        assert_eq!(codes, ["DER-1-001", "DER-1-003", "DER-1-005"]);
        assert_eq!(
            query.removed_tags(),
            [EligibilityTag::YouthOnly, EligibilityTag::MilitaryOnly]
        );
    }

    #[test]
    fn sorts_by_odds_descending_keeping_ties_in_store_order() {
        let store = HuntRecordStore::new(vec![
            record("ELK-1-004", "", 5.0),
            record("ELK-1-001", "", 12.5),
            record("ELK-1-003", "", 5.0),
            record("ELK-1-002", "", 40.0),
        ]);
        let results = QueryEngine::new(&store).run(&everything("ELK", WeaponCode::AnyLegal));
        let codes: Vec<_> = results.iter().map(|r| r.hunt_code.as_str()).collect();
        assert_eq!(codes, ["ELK-1-002", "ELK-1-001", "ELK-1-004", "ELK-1-003"]);
    }

    #[test]
    fn sorts_by_code_ascending() {
        let store = HuntRecordStore::new(vec![
            record("ELK-1-004", "", 5.0),
            record("ELK-1-001", "", 12.5),
            record("ELK-1-003", "", 5.0),
        ]);
        let mut query = everything("ELK", WeaponCode::AnyLegal);
        query.sort_by_odds = false;
        let results = QueryEngine::new(&store).run(&query);
        let codes: Vec<_> = results.iter().map(|r| r.hunt_code.as_str()).collect();
        assert_eq!(codes, ["ELK-1-001", "ELK-1-003", "ELK-1-004"]);
    }

    #[test]
    fn lookup_formats_chance() {
        let mut rec = record("ANT-1-101", "", 21.0);
        rec.n_licenses = 50;
        rec.r_tot = 200;
        let store = HuntRecordStore::new(vec![rec]);
        let engine = QueryEngine::new(&store);
        assert_eq!(
            engine.lookup("ANT-1-101").unwrap(),
            "Chance of getting ANT-1-101: 21.00%"
        );
        assert_eq!(
            engine.lookup("  ANT-1-101 ").unwrap(),
            "Chance of getting ANT-1-101: 21.00%"
        );
    }

    #[test]
    fn lookup_of_unknown_code_is_code_not_found() {
        let store = HuntRecordStore::new(vec![record("ANT-1-101", "", 1.0)]);
        match QueryEngine::new(&store).lookup("BHS-1-001") {
            Err(HuntOddsError::CodeNotFound { code }) => assert_eq!(code, "BHS-1-001"),
            other => panic!("expected code not found, got {other:?}"),
        }
    }

    #[test]
    fn lookup_with_zero_applicants_is_division_guard() {
        let mut rec = record("ANT-1-101", "", 0.0);
        rec.r_tot = 0;
        let store = HuntRecordStore::new(vec![rec]);
        assert!(matches!(
            QueryEngine::new(&store).lookup("ANT-1-101"),
            Err(HuntOddsError::DivisionGuard)
        ));
    }

    fn arb_records() -> impl Strategy<Value = Vec<HuntRecord>> {
        let species = prop::sample::select(vec!["ANT", "DER", "ELK"]);
        let weapon = prop::sample::select(vec!['1', '2', '3', '9']);
        let description = prop::sample::select(vec![
            "Unit 2",
            "Unit 16 PRIVATE LAND ONLY",
            "youth only",
            "Mobility Impaired Only - Unit 34",
            "Military only, Fort Bliss",
            "Youth Only; private land only",
        ]);
        let odds = prop::sample::select(vec![0.0, 0.00084, 5.0, 12.5, 40.0]);
        prop::collection::vec((species, weapon, description, odds), 0..40).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (species, weapon, description, odds))| {
                    record(&format!("{species}-{weapon}-{i:03}"), description, odds)
                })
                .collect()
        })
    }

    fn arb_query() -> impl Strategy<Value = HuntQuery> {
        (
            prop::sample::select(vec!["", "ANT", "DER", "ELK", "E"]),
            prop::sample::select(WeaponCode::ALL.to_vec()),
            any::<[bool; 4]>(),
            any::<bool>(),
        )
            .prop_map(|(species, weapon, switches, sort_by_odds)| {
                let mut query = HuntQuery::new(species, weapon);
                for (tag, remove) in EligibilityTag::ALL.into_iter().zip(switches) {
                    query.set_removal(tag, remove);
                }
                query.sort_by_odds = sort_by_odds;
                query
            })
    }

    proptest! {
        #[test]
        fn results_respect_every_filter(records in arb_records(), query in arb_query()) {
            let store = HuntRecordStore::new(records.clone());
            let results = QueryEngine::new(&store).run(&query);

            for rec in &results {
                prop_assert!(rec.hunt_code.starts_with(&query.species_prefix));
                prop_assert_eq!(rec.weapon_digit(), Some(query.weapon.digit()));
                for tag in query.removed_tags() {
                    prop_assert!(!rec.unit_description.to_lowercase().contains(tag.phrase()));
                }
            }
            let expected = records.iter().filter(|r| query.matches(r)).count();
            prop_assert_eq!(results.len(), expected);
        }

        #[test]
        fn results_are_ordered(records in arb_records(), query in arb_query()) {
            let store = HuntRecordStore::new(records.clone());
            let results = QueryEngine::new(&store).run(&query);
            let position = |code: &str| records.iter().position(|r| r.hunt_code == code);

            for pair in results.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if query.sort_by_odds {
                    prop_assert!(a.hunt_odds >= b.hunt_odds);
                    if a.hunt_odds == b.hunt_odds {
                        prop_assert!(position(&a.hunt_code) < position(&b.hunt_code));
                    }
                } else {
                    prop_assert!(a.hunt_code <= b.hunt_code);
                }
            }
        }
    }
}
