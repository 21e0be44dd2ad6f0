//! Line-clear scoring

/// Points for clearing 0..=4 rows with one lock
const LINE_SCORES: [u64; 5] = [0, 40, 100, 300, 1200];

/// Points awarded for clearing `cleared` rows at once.
///
/// Clears beyond four cannot happen with the standard pieces but still score
/// 100 per row.
pub fn line_clear_points(cleared: usize) -> u64 {
    LINE_SCORES
        .get(cleared)
        .copied()
        .unwrap_or(cleared as u64 * 100)
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub points: u64,
    pub lines: u32,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clear of `cleared` rows, returns the points gained
    pub fn add_clear(&mut self, cleared: usize) -> u64 {
        let gained = line_clear_points(cleared);
        self.points += gained;
        self.lines += cleared as u32;
        gained
    }
}
