//! Per-example classification against a page's remaining records

use super::aggregator::MatchPool;
use super::similarity::percent_changed;
use super::{Bucket, MatchPolicy, TieBreak};
use crate::extract::IncomingExample;

/// How one incoming example relates to the stored records
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// Same content as an available record
    Unchanged { record: usize },
    /// An edit of an available record
    Updated { record: usize, percent_changed: f64 },
    /// Nothing close enough on the page
    New,
}

impl Classification {
    pub fn bucket(&self) -> Bucket {
        match self {
            Classification::Unchanged { .. } => Bucket::Unchanged,
            Classification::Updated { .. } => Bucket::Updated,
            Classification::New => Bucket::New,
        }
    }
}

/// Classify one example against the records that still have unmatched
/// occurrences
///
/// Exact fingerprint matches win outright. Otherwise every available
/// record is compared against the example and the policy's tie-break picks
/// among those under the threshold. The pool is not touched.
pub fn classify(example: &IncomingExample, pool: &MatchPool<'_>, policy: &MatchPolicy) -> Classification {
    let fingerprint = example.fingerprint();
    if pool.remaining(&fingerprint) > 0 {
        if let Some(record) = pool.record_for(&fingerprint) {
            return Classification::Unchanged { record };
        }
    }

    let code = example.trimmed();
    let mut best: Option<(usize, f64)> = None;

    for (index, record) in pool.candidates() {
        let percent = percent_changed(&record.code, code);
        if percent >= policy.threshold {
            continue;
        }

        match policy.tie_break {
            TieBreak::FirstMatch => {
                return Classification::Updated {
                    record: index,
                    percent_changed: percent,
                };
            }
            TieBreak::SmallestChange => {
                if best.map_or(true, |(_, smallest)| percent < smallest) {
                    best = Some((index, percent));
                }
            }
        }
    }

    match best {
        Some((record, percent_changed)) => Classification::Updated {
            record,
            percent_changed,
        },
        None => Classification::New,
    }
}
