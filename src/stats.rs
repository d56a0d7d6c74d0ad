// Derived values shown next to a ledger: lifted weight totals and the
// progression tier.
use serde::Serialize;

use crate::record::Record;

/// One band of the progression ladder. `upper` is exclusive; the top band is
/// open ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBand {
    pub label: &'static str,
    pub lower: usize,
    pub upper: Option<usize>,
}

pub const TIERS: [TierBand; 5] = [
    TierBand {
        label: "Beginner",
        lower: 0,
        upper: Some(10),
    },
    TierBand {
        label: "Novice",
        lower: 10,
        upper: Some(30),
    },
    TierBand {
        label: "Intermediate",
        lower: 30,
        upper: Some(60),
    },
    TierBand {
        label: "Advanced",
        lower: 60,
        upper: Some(100),
    },
    TierBand {
        label: "Elite",
        lower: 100,
        upper: None,
    },
];

/// Where an entry count falls on the progression ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tier {
    pub label: &'static str,
    /// 0 for the first band up to 4 for the last.
    pub rank: usize,
    /// Completion within the band, 0 to 100.
    pub progress: f64,
}

/// Summary shown alongside a ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub entries: usize,
    pub total_weight: f64,
    pub average_weight_per_set: f64,
    pub best_weight: Option<f64>,
    pub tier: Tier,
}

impl LedgerSummary {
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            entries: records.len(),
            total_weight: total_weight(records),
            average_weight_per_set: average_weight_per_set(records),
            best_weight: best_weight(records),
            tier: progression_tier(records.len()),
        }
    }
}

/// Total weight moved: all but the last set at `reps`, the last set at
/// `last_set_reps`.
///
/// Rows whose numbers cannot be read are skipped.
pub fn total_weight(records: &[Record]) -> f64 {
    records
        .iter()
        .filter_map(Record::parsed)
        .map(|r| {
            let sets = f64::from(r.sets);
            (sets - 1.0) * f64::from(r.reps) * r.weight + f64::from(r.last_set_reps) * r.weight
        })
        .sum()
}

/// [`total_weight`] divided by the number of rows, `0` for an empty slice.
pub fn average_weight_per_set(records: &[Record]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    total_weight(records) / records.len() as f64
}

/// Heaviest readable weight in the ledger.
pub fn best_weight(records: &[Record]) -> Option<f64> {
    records
        .iter()
        .filter_map(Record::parsed)
        .map(|r| r.weight)
        .fold(None, |best, w| match best {
            Some(b) if b >= w => Some(b),
            _ => Some(w),
        })
}

pub fn progression_tier(count: usize) -> Tier {
    let rank = TIERS
        .iter()
        .rposition(|band| count >= band.lower)
        .unwrap_or(0);
    let band = TIERS[rank];
    let progress = match band.upper {
        Some(upper) => (count - band.lower) as f64 / (upper - band.lower) as f64 * 100.0,
        None => 100.0,
    };
    Tier {
        label: band.label,
        rank,
        progress,
    }
}
