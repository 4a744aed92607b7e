use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::Microliters};

/// Pipette tip with the reserve that is kept in it for reverse pipetting.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub capacity: Microliters,

    /// Withdrawn right after the pick-up and never dispensed.
    #[serde(default)]
    pub reserve: Microliters,
}

impl Tip {
    /// Volume that a single run may carry.
    pub fn usable_capacity(self) -> Result<Microliters> {
        ensure!(self.reserve >= Microliters::ZERO, "negative tip reserve: {}", self.reserve);
        ensure!(
            self.reserve < self.capacity,
            "tip reserve ({}) leaves nothing of the {} capacity",
            self.reserve,
            self.capacity,
        );
        Ok(self.capacity - self.reserve)
    }
}

/// Target volume split into equal runs.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub runs: u32,

    /// Volume of each run.
    pub volume: Microliters,
}

impl Split {
    /// Split the target into the fewest equal runs that fit the usable capacity.
    ///
    /// A non-positive target yields zero runs.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(target: Microliters, usable_capacity: Microliters) -> Self {
        if !target.is_positive() {
            return Self { runs: 0, volume: Microliters::ZERO };
        }
        let runs = (target / usable_capacity).ceil() as u32;
        Self { runs, volume: target / f64::from(runs) }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_usable_capacity() {
        let tip = Tip { capacity: Microliters(200.0), reserve: Microliters(20.0) };
        assert_eq!(tip.usable_capacity().unwrap(), Microliters(180.0));
    }

    #[test]
    fn test_reserve_exhausts_capacity() {
        let tip = Tip { capacity: Microliters(10.0), reserve: Microliters(10.0) };
        assert!(tip.usable_capacity().is_err());
        let tip = Tip { capacity: Microliters(10.0), reserve: Microliters(12.0) };
        assert!(tip.usable_capacity().is_err());
    }

    #[test]
    fn test_negative_reserve() {
        let tip = Tip { capacity: Microliters(10.0), reserve: Microliters(-1.0) };
        assert!(tip.usable_capacity().is_err());
    }

    #[test]
    fn test_equal_runs() {
        let split = Split::new(Microliters(400.0), Microliters(180.0));
        assert_eq!(split.runs, 3);
        assert_abs_diff_eq!(split.volume.0, 133.333, epsilon = 0.001);
    }

    #[test]
    fn test_exact_multiple() {
        let split = Split::new(Microliters(360.0), Microliters(180.0));
        assert_eq!(split, Split { runs: 2, volume: Microliters(180.0) });
    }

    #[test]
    fn test_single_run() {
        let split = Split::new(Microliters(7.5), Microliters(8.0));
        assert_eq!(split, Split { runs: 1, volume: Microliters(7.5) });
    }

    #[test]
    fn test_zero_target() {
        let split = Split::new(Microliters::ZERO, Microliters(180.0));
        assert_eq!(split.runs, 0);
    }

    #[test]
    fn test_runs_cover_target() {
        for usable in [8.0, 50.0, 133.0, 180.0] {
            for target in [0.5, 7.9, 8.0, 10.0, 99.9, 180.0, 250.0, 350.0, 400.0] {
                let split = Split::new(Microliters(target), Microliters(usable));
                assert_eq!(f64::from(split.runs), (target / usable).ceil());
                assert!(split.volume.0 <= usable + 1e-9);
                assert_abs_diff_eq!(split.volume.0 * f64::from(split.runs), target, epsilon = 1e-9);
            }
        }
    }
}
