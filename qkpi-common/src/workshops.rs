//! Canonical workshops, workshop groups and storage-key aliases
//!
//! The plant has eight workshops split into two production units. Counter
//! tables do not agree on how a workshop is keyed: production counters use
//! plural display names, scrap costs use lowercase aliases and complaints
//! use abbreviations. [`AliasTable`] holds one mapping per counter family so
//! the aggregator never hard-codes a translation.

use serde::Serialize;
use std::collections::HashMap;

use crate::kpi::CounterFamily;

/// Scope tag and threshold key of the full-plant aggregate
pub const TOTAL_TAG: &str = "Total";

/// Canonical workshops in reporting order
pub const CANONICAL_WORKSHOPS: [&str; 8] = [
    "Manchon",
    "Collier de Fixation",
    "Rack",
    "Moulage",
    "Isolation Thermique",
    "Isolation Souple",
    "Composite",
    "Atelier de Visualisation",
];

/// Production-unit groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Group {
    /// Thermal and flexible insulation
    #[serde(rename = "UAP1")]
    A,
    /// Every other workshop
    #[serde(rename = "UAP2")]
    B,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::A, Group::B];

    /// Canonical tag, also used as the threshold key
    pub fn tag(self) -> &'static str {
        match self {
            Group::A => "UAP1",
            Group::B => "UAP2",
        }
    }

    pub fn members(self) -> &'static [&'static str] {
        match self {
            Group::A => &["Isolation Thermique", "Isolation Souple"],
            Group::B => &[
                "Manchon",
                "Collier de Fixation",
                "Rack",
                "Moulage",
                "Composite",
                "Atelier de Visualisation",
            ],
        }
    }

    /// Parse a group tag, accepting the spaced spelling used by older forms
    pub fn from_tag(tag: &str) -> Option<Group> {
        match tag {
            "UAP1" | "UAP 1" => Some(Group::A),
            "UAP2" | "UAP 2" => Some(Group::B),
            _ => None,
        }
    }
}

/// Whether `tag` names the full-plant aggregate
pub fn is_total_tag(tag: &str) -> bool {
    matches!(tag, "Total" | "Usine Complète")
}

pub fn is_canonical(workshop: &str) -> bool {
    CANONICAL_WORKSHOPS.contains(&workshop)
}

/// Per-family mapping from workshop display name to storage keys
#[derive(Debug, Clone)]
pub struct AliasTable {
    families: HashMap<CounterFamily, HashMap<String, Vec<String>>>,
}

impl AliasTable {
    /// Aliases matching the keys found in the fact tables
    pub fn standard() -> Self {
        let production: &[(&str, &[&str])] = &[
            ("Manchon", &["Manchons"]),
            ("Collier de Fixation", &["Colliers"]),
            ("Rack", &["Racks"]),
            ("Moulage", &["Moulage"]),
            (
                "Isolation Thermique",
                &["Protections thermiques", "Protection thermique", "Isolant thermique"],
            ),
            ("Isolation Souple", &["Isolant souple"]),
            ("Composite", &["Composite"]),
            ("Atelier de Visualisation", &["Système de visualisation"]),
        ];

        // Visualisation costs were historically booked under the flexible
        // insulation key. Reads still include it; writes go to its own key.
        let scrap_cost: &[(&str, &[&str])] = &[
            ("Manchon", &["manchons"]),
            ("Collier de Fixation", &["colliers"]),
            ("Rack", &["rack"]),
            ("Moulage", &["moulage"]),
            ("Isolation Thermique", &["isolation termique"]),
            ("Isolation Souple", &["isolation souple"]),
            ("Composite", &["composite"]),
            (
                "Atelier de Visualisation",
                &["atelier de visualisation", "isolation souple"],
            ),
        ];

        let complaints: &[(&str, &[&str])] = &[
            ("Manchon", &["Manchons"]),
            ("Collier de Fixation", &["Colliers"]),
            ("Rack", &["Racks"]),
            ("Moulage", &["Moulage"]),
            ("Isolation Thermique", &["P.Thermiques"]),
            ("Isolation Souple", &["I.Souples"]),
            ("Composite", &["Composite"]),
            ("Atelier de Visualisation", &["Atelier de Visualisation", "I.Souples"]),
        ];

        let mut table = Self::empty();
        for (family, entries) in [
            (CounterFamily::Production, production),
            (CounterFamily::ScrapCost, scrap_cost),
            (CounterFamily::Complaints, complaints),
        ] {
            for &(workshop, keys) in entries {
                table.insert(family, workshop, keys.iter().map(|k| k.to_string()).collect());
            }
        }
        table
    }

    /// Table without aliases: every workshop falls back to its default key
    pub fn empty() -> Self {
        Self {
            families: HashMap::new(),
        }
    }

    pub fn insert(&mut self, family: CounterFamily, workshop: &str, keys: Vec<String>) {
        self.families
            .entry(family)
            .or_default()
            .insert(workshop.to_string(), keys);
    }

    /// Every storage key the workshop's counters may be stored under
    ///
    /// Unknown workshops fall back to their own name (lowercased for the
    /// scrap-cost family, whose keys are all lowercase).
    pub fn storage_keys(&self, family: CounterFamily, workshop: &str) -> Vec<String> {
        self.families
            .get(&family)
            .and_then(|aliases| aliases.get(workshop))
            .filter(|keys| !keys.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![fallback_key(family, workshop)])
    }

    /// Key new counters are written under
    pub fn primary_key(&self, family: CounterFamily, workshop: &str) -> String {
        self.storage_keys(family, workshop)
            .into_iter()
            .next()
            .unwrap_or_else(|| fallback_key(family, workshop))
    }

    /// Another workshop of the family whose primary key is the same as
    /// `workshop`'s, if any
    pub fn primary_key_shared_with(
        &self,
        family: CounterFamily,
        workshop: &str,
    ) -> Option<String> {
        let key = self.primary_key(family, workshop);
        let aliases = self.families.get(&family)?;
        let mut others: Vec<&String> = aliases
            .keys()
            .filter(|other| other.as_str() != workshop)
            .filter(|other| self.primary_key(family, other) == key)
            .collect();
        others.sort();
        others.first().map(|other| other.to_string())
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn fallback_key(family: CounterFamily, workshop: &str) -> String {
    match family {
        CounterFamily::ScrapCost => workshop.to_lowercase(),
        _ => workshop.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_groups_partition_canonical_workshops() {
        let a: HashSet<&str> = Group::A.members().iter().copied().collect();
        let b: HashSet<&str> = Group::B.members().iter().copied().collect();
        let all: HashSet<&str> = CANONICAL_WORKSHOPS.iter().copied().collect();

        assert!(a.is_disjoint(&b));
        assert_eq!(a.union(&b).copied().collect::<HashSet<_>>(), all);
        assert_eq!(a.len() + b.len(), CANONICAL_WORKSHOPS.len());
    }

    #[test]
    fn test_group_tag_spellings() {
        assert_eq!(Group::from_tag("UAP1"), Some(Group::A));
        assert_eq!(Group::from_tag("UAP 2"), Some(Group::B));
        assert_eq!(Group::from_tag("uap1"), None);
    }

    #[test]
    fn test_families_use_different_keys() {
        let aliases = AliasTable::standard();
        assert_eq!(
            aliases.storage_keys(CounterFamily::Production, "Manchon"),
            vec!["Manchons"]
        );
        assert_eq!(
            aliases.storage_keys(CounterFamily::ScrapCost, "Manchon"),
            vec!["manchons"]
        );
        assert_eq!(
            aliases.storage_keys(CounterFamily::Complaints, "Isolation Thermique"),
            vec!["P.Thermiques"]
        );
    }

    #[test]
    fn test_legacy_production_keys_are_all_listed() {
        let aliases = AliasTable::standard();
        let keys = aliases.storage_keys(CounterFamily::Production, "Isolation Thermique");
        assert_eq!(keys.len(), 3);
        assert_eq!(
            aliases.primary_key(CounterFamily::Production, "Isolation Thermique"),
            "Protections thermiques"
        );
    }

    #[test]
    fn test_primary_keys_are_not_shared() {
        let aliases = AliasTable::standard();
        for family in [
            CounterFamily::Production,
            CounterFamily::ScrapCost,
            CounterFamily::Complaints,
        ] {
            let primaries: HashSet<String> = CANONICAL_WORKSHOPS
                .iter()
                .map(|w| aliases.primary_key(family, w))
                .collect();
            assert_eq!(primaries.len(), CANONICAL_WORKSHOPS.len(), "{:?}", family);
            for workshop in CANONICAL_WORKSHOPS {
                assert_eq!(aliases.primary_key_shared_with(family, workshop), None);
            }
        }
    }

    #[test]
    fn test_visualisation_still_reads_legacy_keys() {
        let aliases = AliasTable::standard();
        assert_eq!(
            aliases.storage_keys(CounterFamily::ScrapCost, "Atelier de Visualisation"),
            vec!["atelier de visualisation", "isolation souple"]
        );
        assert_eq!(
            aliases.primary_key(CounterFamily::Complaints, "Atelier de Visualisation"),
            "Atelier de Visualisation"
        );
    }

    #[test]
    fn test_shared_primary_key_is_reported() {
        let mut aliases = AliasTable::empty();
        aliases.insert(CounterFamily::ScrapCost, "A", vec!["shared".to_string()]);
        aliases.insert(CounterFamily::ScrapCost, "B", vec!["shared".to_string()]);
        assert_eq!(
            aliases.primary_key_shared_with(CounterFamily::ScrapCost, "A"),
            Some("B".to_string())
        );
        assert_eq!(aliases.primary_key_shared_with(CounterFamily::Production, "A"), None);
    }

    #[test]
    fn test_unknown_workshop_fallback() {
        let aliases = AliasTable::standard();
        assert_eq!(
            aliases.storage_keys(CounterFamily::Production, "Extrusion"),
            vec!["Extrusion"]
        );
        assert_eq!(
            aliases.storage_keys(CounterFamily::ScrapCost, "Extrusion"),
            vec!["extrusion"]
        );
    }
}
