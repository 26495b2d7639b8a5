//! Record subset selection by date range and categorical values.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use traffic_core::models::TrafficRecord;

/// Inclusive date bounds plus optional allow-lists.
///
/// `None` means "no restriction"; an empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubsetFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub pages: Option<BTreeSet<String>>,
    pub devices: Option<BTreeSet<String>>,
    pub countries: Option<BTreeSet<String>>,
}

impl SubsetFilter {
    /// Build a filter from CLI-style lists, where an empty list means
    /// "no restriction".
    pub fn from_lists(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        pages: &[String],
        devices: &[String],
        countries: &[String],
    ) -> Self {
        let set = |values: &[String]| {
            (!values.is_empty()).then(|| values.iter().cloned().collect::<BTreeSet<_>>())
        };
        Self {
            from,
            to,
            pages: set(pages),
            devices: set(devices),
            countries: set(countries),
        }
    }

    /// `true` when the filter keeps every record.
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `record` passes every constraint.
    pub fn matches(&self, record: &TrafficRecord) -> bool {
        let allowed = |set: &Option<BTreeSet<String>>, value: &str| {
            set.as_ref().map_or(true, |s| s.contains(value))
        };
        self.from.map_or(true, |d| record.date >= d)
            && self.to.map_or(true, |d| record.date <= d)
            && allowed(&self.pages, &record.page)
            && allowed(&self.devices, &record.device)
            && allowed(&self.countries, &record.country)
    }

    /// Records passing the filter, in input order.
    pub fn apply(&self, records: &[TrafficRecord]) -> Vec<TrafficRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Stable hash of the filter parameters.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
