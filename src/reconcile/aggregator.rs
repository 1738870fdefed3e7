//! Duplicate-aware aggregation of a page's classifications
//!
//! Identical examples can appear on a page more than once, and one stored
//! record may stand for several of them (`instances_on_page`). Matching is
//! therefore done against a multiset of remaining occurrences per
//! fingerprint rather than against records.

use super::classifier::{classify, Classification};
use super::MatchPolicy;
use crate::extract::IncomingExample;
use crate::record::ExampleRecord;
use std::collections::{HashMap, VecDeque};

/// A record still available for matching and how many of its occurrences
/// are left
#[derive(Debug, Clone, Copy)]
struct Holder {
    record: usize,
    remaining: usize,
}

/// All records sharing one fingerprint
#[derive(Debug, Clone)]
struct Slot {
    holders: VecDeque<Holder>,
    remaining: usize,
}

/// Remaining occurrence counts for one page's active records
///
/// Read-only to the classifier; the aggregator consumes occurrences as it
/// assigns matches.
#[derive(Debug, Clone)]
pub struct MatchPool<'a> {
    records: &'a [ExampleRecord],
    slots: Vec<Slot>,
    by_fingerprint: HashMap<&'a str, usize>,
}

impl<'a> MatchPool<'a> {
    /// Build the pool from active records, in stored order
    pub fn new(records: &'a [ExampleRecord]) -> Self {
        let mut slots: Vec<Slot> = Vec::new();
        let mut by_fingerprint: HashMap<&'a str, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let holder = Holder {
                record: index,
                remaining: record.occurrences(),
            };

            match by_fingerprint.get(record.fingerprint.as_str()) {
                Some(&slot) => {
                    slots[slot].remaining += holder.remaining;
                    slots[slot].holders.push_back(holder);
                }
                None => {
                    by_fingerprint.insert(record.fingerprint.as_str(), slots.len());
                    slots.push(Slot {
                        holders: VecDeque::from([holder]),
                        remaining: holder.remaining,
                    });
                }
            }
        }

        Self {
            records,
            slots,
            by_fingerprint,
        }
    }

    pub fn records(&self) -> &'a [ExampleRecord] {
        self.records
    }

    /// Occurrences of this fingerprint not yet matched
    pub fn remaining(&self, fingerprint: &str) -> usize {
        self.by_fingerprint
            .get(fingerprint)
            .map_or(0, |&slot| self.slots[slot].remaining)
    }

    /// The record the next match on this fingerprint would consume
    pub fn record_for(&self, fingerprint: &str) -> Option<usize> {
        let slot = &self.slots[*self.by_fingerprint.get(fingerprint)?];
        slot.holders.front().map(|h| h.record)
    }

    /// One representative record per fingerprint with occurrences left, in
    /// stored order
    pub fn candidates(&self) -> impl Iterator<Item = (usize, &'a ExampleRecord)> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.remaining > 0)
            .filter_map(|slot| slot.holders.front())
            .map(|holder| (holder.record, &self.records[holder.record]))
    }

    /// Take one occurrence of a fingerprint, returning the record it
    /// belonged to
    pub fn consume(&mut self, fingerprint: &str) -> Option<usize> {
        let slot = &mut self.slots[*self.by_fingerprint.get(fingerprint)?];
        let holder = slot.holders.front_mut()?;
        let record = holder.record;

        holder.remaining -= 1;
        if holder.remaining == 0 {
            slot.holders.pop_front();
        }
        slot.remaining -= 1;

        Some(record)
    }

    /// Every unmatched occurrence, as the index of its record
    pub fn into_leftovers(self) -> Vec<usize> {
        let mut leftovers = Vec::new();
        for slot in self.slots {
            for holder in slot.holders {
                leftovers.extend(std::iter::repeat(holder.record).take(holder.remaining));
            }
        }
        leftovers.sort_unstable();
        leftovers
    }
}

/// An incoming example paired with the stored record it matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index into the incoming examples
    pub incoming: usize,
    /// Index into the active records
    pub record: usize,
}

/// Every incoming example and every active occurrence, sorted into buckets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    /// Incoming indices with no stored counterpart
    pub new: Vec<usize>,
    pub updated: Vec<Match>,
    pub unchanged: Vec<Match>,
    /// One active record index per unmatched occurrence
    pub removed: Vec<usize>,
}

impl Buckets {
    /// Buckets for a page with no stored examples
    pub fn all_new(incoming: usize) -> Self {
        Self {
            new: (0..incoming).collect(),
            ..Default::default()
        }
    }

    /// Occurrences matched to a stored record
    pub fn matched(&self) -> usize {
        self.updated.len() + self.unchanged.len()
    }

    /// Incoming examples that landed in a bucket
    pub fn classified(&self) -> usize {
        self.new.len() + self.matched()
    }
}

/// Sort a page's incoming examples and active records into buckets
///
/// Exact matches are assigned first across the whole page, so an edited
/// example can't claim a record that an identical example appears later
/// to match. The remaining examples then go through the classifier one by
/// one, in page order.
pub fn aggregate(
    active: &[ExampleRecord],
    incoming: &[IncomingExample],
    policy: &MatchPolicy,
) -> Buckets {
    let mut pool = MatchPool::new(active);
    let mut buckets = Buckets::default();
    let mut deferred = Vec::new();

    for (index, example) in incoming.iter().enumerate() {
        match pool.consume(&example.fingerprint()) {
            Some(record) => buckets.unchanged.push(Match {
                incoming: index,
                record,
            }),
            None => deferred.push(index),
        }
    }

    for index in deferred {
        let example = &incoming[index];
        let classification = classify(example, &pool, policy);
        tracing::debug!("Incoming example {} classified as {}", index, classification.bucket());

        match classification {
            Classification::New => buckets.new.push(index),
            Classification::Unchanged { record } | Classification::Updated { record, .. } => {
                let fingerprint = active[record].fingerprint.as_str();
                let Some(record) = pool.consume(fingerprint) else {
                    buckets.new.push(index);
                    continue;
                };
                let matched = Match {
                    incoming: index,
                    record,
                };
                if matches!(classification, Classification::Unchanged { .. }) {
                    buckets.unchanged.push(matched);
                } else {
                    buckets.updated.push(matched);
                }
            }
        }
    }

    buckets.removed = pool.into_leftovers();
    buckets
}
