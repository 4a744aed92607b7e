quantity!(Microliters, "µL");
quantity!(Milliliters, "mL");

impl From<Milliliters> for Microliters {
    fn from(value: Milliliters) -> Self {
        Self(value.0 * 1000.0)
    }
}

impl From<Microliters> for Milliliters {
    fn from(value: Microliters) -> Self {
        Self(value.0 * 0.001)
    }
}

impl Microliters {
    /// Negative and `NaN` volumes count as nothing.
    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}
