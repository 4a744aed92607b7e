quantity!(FlowRate, "×");

impl FlowRate {
    pub const NOMINAL: Self = Self(1.0);
}
