quantity!(Millimeters, "mm");

impl Millimeters {
    /// Round to 0.01 mm, finer steps are only floating-point noise for the motion controller.
    #[must_use]
    pub fn round_to_hundredths(self) -> Self {
        Self((self.0 * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_round_to_hundredths() {
        assert_abs_diff_eq!(Millimeters(-57.205_555).round_to_hundredths().0, -57.21);
        assert_abs_diff_eq!(Millimeters(12.344).round_to_hundredths().0, 12.34);
    }
}
