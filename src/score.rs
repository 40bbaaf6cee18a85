//! Scoring policy
//!
//! Line clears use a bonus table rather than linear per-line points, hard
//! drops add a flat bonus regardless of lines cleared, and the level follows
//! the score in fixed steps.

use serde::{Deserialize, Serialize};

/// Score rules as a value object, loaded from the `[scoring]` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub single: u64,
    pub double: u64,
    pub triple: u64,
    pub tetris: u64,
    /// Added on every explicit hard drop, never on gravity ticks
    pub hard_drop_bonus: u64,
    /// Points per level
    pub level_step: u64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            single: 100,
            double: 300,
            triple: 500,
            tetris: 800,
            hard_drop_bonus: 10,
            level_step: 1000,
        }
    }
}

impl ScoringPolicy {
    /// Points for clearing `lines` rows with one lock
    pub fn line_clear(&self, lines: usize) -> u64 {
        match lines {
            0 => 0,
            1 => self.single,
            2 => self.double,
            3 => self.triple,
            4 => self.tetris,
            // Unreachable with tetrominoes; scale linearly just in case
            n => n as u64 * self.single,
        }
    }

    /// Level implied by a score, starting at 1
    pub fn level_for(&self, score: u64) -> u32 {
        let step = self.level_step.max(1);
        u32::try_from(score / step)
            .unwrap_or(u32::MAX - 1)
            .saturating_add(1)
    }
}

/// Score and level of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    pub points: u64,
    pub level: u32,
    pub lines: u32,
}

impl Score {
    pub fn new() -> Self {
        Self {
            points: 0,
            level: 1,
            lines: 0,
        }
    }

    /// Add the points for a settled piece and raise the level if the new
    /// score crosses a step. The level never goes down.
    pub fn add_lock(&mut self, policy: &ScoringPolicy, lines: usize, hard_drop: bool) {
        self.lines += lines as u32;
        self.points += policy.line_clear(lines);
        if hard_drop {
            self.points += policy.hard_drop_bonus;
        }
        self.level = self.level.max(policy.level_for(self.points));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_clear_table() {
        let policy = ScoringPolicy::default();
        let expected = [0, 100, 300, 500, 800];
        for (lines, points) in expected.into_iter().enumerate() {
            let mut score = Score::new();
            score.add_lock(&policy, lines, false);
            assert_eq!(score.points, points);
            assert_eq!(score.lines, lines as u32);
        }
    }

    #[test]
    fn test_hard_drop_bonus_is_flat() {
        let policy = ScoringPolicy::default();
        let mut score = Score::new();
        score.add_lock(&policy, 0, true);
        assert_eq!(score.points, 10);
        score.add_lock(&policy, 4, true);
        assert_eq!(score.points, 10 + 800 + 10);
    }

    #[test]
    fn test_level_up_each_thousand() {
        let policy = ScoringPolicy::default();
        let mut score = Score::new();
        score.add_lock(&policy, 4, false);
        assert_eq!(score.level, 1);
        score.add_lock(&policy, 2, false);
        assert_eq!((score.points, score.level), (1100, 2));
        score.add_lock(&policy, 4, false);
        score.add_lock(&policy, 1, false);
        assert_eq!((score.points, score.level), (2000, 3));
    }

    #[test]
    fn test_level_never_decreases() {
        let policy = ScoringPolicy::default();
        let mut score = Score::new();
        score.level = 5;
        score.add_lock(&policy, 1, false);
        assert_eq!(score.level, 5);
    }
}
