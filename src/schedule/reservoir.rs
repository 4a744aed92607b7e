use serde::Serialize;

use crate::{depth::Vessel, prelude::*, quantity::Microliters};

/// Running estimate of the liquid left in a source vessel.
///
/// This is bookkeeping, not a measurement: it only knows what has been withdrawn.
#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reservoir {
    pub vessel: Vessel,
    pub remaining: Microliters,
}

impl Reservoir {
    pub const fn new(vessel: Vessel, remaining: Microliters) -> Self {
        Self { vessel, remaining }
    }

    /// Account for a withdrawal and return the updated estimate.
    pub fn withdraw(mut self, volume: Microliters) -> Self {
        let was_overdrawn = self.is_overdrawn();
        self.remaining -= volume;
        if !was_overdrawn && self.is_overdrawn() {
            warn!(
                labware = %self.vessel.labware,
                well = %self.vessel.well,
                remaining = %self.remaining,
                "The source is overdrawn",
            );
        }
        self
    }

    pub fn is_overdrawn(&self) -> bool {
        self.remaining < Microliters::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labware::WellName;

    fn reservoir(remaining: f64) -> Reservoir {
        Reservoir::new(
            Vessel {
                labware: "colors".into(),
                well: WellName::new('B', 3),
                profile: "GREINER_50mL".to_owned(),
            },
            Microliters(remaining),
        )
    }

    #[test]
    fn test_withdraw() {
        let reservoir = reservoir(40_000.0).withdraw(Microliters(20.0)).withdraw(Microliters(180.0));
        assert_eq!(reservoir.remaining, Microliters(39_800.0));
        assert!(!reservoir.is_overdrawn());
    }

    #[test]
    fn test_overdrawn_is_not_clamped() {
        let reservoir = reservoir(100.0).withdraw(Microliters(150.0));
        assert_eq!(reservoir.remaining, Microliters(-50.0));
        assert!(reservoir.is_overdrawn());
    }
}
