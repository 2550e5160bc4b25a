//! Latest-record-per-area reduction

use chrono::NaiveDate;
use std::collections::btree_map::{self, BTreeMap, Entry};

use crate::models::{AgeBandRecord, VaccinationRecord};

/// Identifies one geographic reporting unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub area_type: String,
    pub area_code: String,
}

impl GroupKey {
    pub fn new(area_type: impl Into<String>, area_code: impl Into<String>) -> Self {
        Self {
            area_type: area_type.into(),
            area_code: area_code.into(),
        }
    }
}

/// A dated record that belongs to one area
pub trait GroupedRecord {
    fn group_key(&self) -> GroupKey;
    fn date(&self) -> NaiveDate;
}

impl GroupedRecord for AgeBandRecord {
    fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.area_type, &self.area_code)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl GroupedRecord for VaccinationRecord {
    fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.area_type, &self.area_code)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Most recent record seen for each area.
///
/// Iteration is ordered by `(area_type, area_code)`.
#[derive(Debug, Clone)]
pub struct LatestByGroup<R> {
    entries: BTreeMap<GroupKey, R>,
}

impl<R> Default for LatestByGroup<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<R: GroupedRecord> LatestByGroup<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a record. Replaces the stored one only when strictly newer;
    /// on equal dates the first record seen is kept.
    ///
    /// Returns `true` when the record was stored.
    pub fn offer(&mut self, record: R) -> bool {
        match self.entries.entry(record.group_key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(mut slot) => {
                if record.date() > slot.get().date() {
                    slot.insert(record);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn get(&self, key: &GroupKey) -> Option<&R> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, GroupKey, R> {
        self.entries.iter()
    }

    pub fn into_records(self) -> impl Iterator<Item = R> {
        self.entries.into_values()
    }
}

impl<R> IntoIterator for LatestByGroup<R> {
    type Item = (GroupKey, R);
    type IntoIter = btree_map::IntoIter<GroupKey, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Reduce an unordered sequence of records to the latest one per area.
///
/// Single pass, no I/O. Input order only matters for ties on date.
pub fn latest_per_group<R, I>(records: I) -> LatestByGroup<R>
where
    R: GroupedRecord,
    I: IntoIterator<Item = R>,
{
    let mut latest = LatestByGroup::new();
    for record in records {
        latest.offer(record);
    }
    latest
}
