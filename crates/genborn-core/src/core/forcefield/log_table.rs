const LN2: f32 = 0.693_147_18;

/// Default number of mantissa bits resolved by the table.
pub const LOG_TABLE_ACCURACY: u32 = 15;

/// A lookup table approximating the natural logarithm from the IEEE-754 single-precision
/// representation: the exponent is taken exactly and the leading mantissa bits index a
/// table of `log2` values over `[1, 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTable {
    accuracy: u32,
    entries: Vec<f32>,
}

impl Default for LogTable {
    fn default() -> Self {
        Self::new(LOG_TABLE_ACCURACY)
    }
}

impl LogTable {
    /// Builds a table resolving `accuracy` mantissa bits. `accuracy` is clamped to `1..=23`.
    pub fn new(accuracy: u32) -> Self {
        let accuracy = accuracy.clamp(1, 23);
        let increment = 1u32 << (23 - accuracy);
        let entries = (0..1u32 << accuracy)
            .map(|i| f32::from_bits(0x3F80_0000 + i * increment).log2())
            .collect();
        Self { accuracy, entries }
    }

    pub fn accuracy(&self) -> u32 {
        self.accuracy
    }

    /// Approximates `ln(value)` for a positive, normal `value`.
    #[inline]
    pub fn ln(&self, value: f64) -> f64 {
        let bits = (value as f32).to_bits();
        let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
        let index = ((bits & 0x7F_FFFF) >> (23 - self.accuracy)) as usize;
        f64::from((self.entries[index] + exponent as f32) * LN2)
    }
}
