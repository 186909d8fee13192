//! Before/after totals over a set of records.

use crate::index::ImageRecord;

/// A point along the lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePoint {
    Original,
    Converted,
    Resized,
    Optimized,
}

impl SizePoint {
    fn bytes(self, record: &ImageRecord) -> u64 {
        let lineage = &record.lineage;
        match self {
            Self::Original => lineage.original,
            Self::Converted => lineage.converted_bytes(),
            Self::Resized => lineage.resized_bytes(),
            Self::Optimized => lineage.optimized_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total_before: u64,
    pub total_after: u64,
    pub reduction_percent: f64,
}

impl Summary {
    pub fn saved(&self) -> u64 {
        self.total_before.saturating_sub(self.total_after)
    }
}

/// Totals between two lineage points. Zero `total_before` reports 0%.
#[allow(clippy::cast_precision_loss)]
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a ImageRecord>,
    from: SizePoint,
    to: SizePoint,
) -> Summary {
    let (total_before, total_after) = records.into_iter().fold((0u64, 0u64), |(b, a), r| {
        (b + from.bytes(r), a + to.bytes(r))
    });

    let reduction_percent = if total_before == 0 {
        0.0
    } else {
        (total_before as f64 - total_after as f64) / total_before as f64 * 100.0
    };

    Summary {
        total_before,
        total_after,
        reduction_percent,
    }
}
