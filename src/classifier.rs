use crate::config::Thresholds;
use crate::models::{StudentAggregate, StudentTotals, Tier};

/// Maps a percentage onto a tier.
///
/// | Range             | Tier    |
/// |-------------------|---------|
/// | < low             | Weak    |
/// | low ..< high      | Average |
/// | >= high           | Bright  |
pub fn tier(percentage: f64, thresholds: &Thresholds) -> Tier {
    match percentage {
        p if p < thresholds.low => Tier::Weak,
        p if p >= thresholds.high => Tier::Bright,
        _ => Tier::Average,
    }
}

pub fn classify_students(totals: Vec<StudentTotals>, thresholds: &Thresholds) -> Vec<StudentAggregate> {
    totals
        .into_iter()
        .map(|totals| StudentAggregate {
            tier: tier(totals.percentage, thresholds),
            totals,
        })
        .collect()
}
