use std::ops::{Add, AddAssign};

/// Energy components of one GB evaluation, in kJ/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolvationTerms {
    /// Tabulated GB energy of the bonded 1-2/1-3/1-4 pairs.
    pub polar_bonded: f64,
    /// Tabulated GB energy of the general short-range pairs.
    pub polar_pairs: f64,
    /// The `-½·k·q²/R` self-energy sum.
    pub self_correction: f64,
    /// The surface-area (ACE-type) nonpolar correction.
    pub nonpolar: f64,
}

impl SolvationTerms {
    pub fn new(polar_bonded: f64, polar_pairs: f64, self_correction: f64, nonpolar: f64) -> Self {
        Self {
            polar_bonded,
            polar_pairs,
            self_correction,
            nonpolar,
        }
    }

    #[inline]
    pub fn polar(&self) -> f64 {
        self.polar_bonded + self.polar_pairs + self.self_correction
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.polar() + self.nonpolar
    }

    pub fn to_array(self) -> [f64; 4] {
        [
            self.polar_bonded,
            self.polar_pairs,
            self.self_correction,
            self.nonpolar,
        ]
    }
}

impl From<[f64; 4]> for SolvationTerms {
    fn from(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }
}

impl Add for SolvationTerms {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            polar_bonded: self.polar_bonded + rhs.polar_bonded,
            polar_pairs: self.polar_pairs + rhs.polar_pairs,
            self_correction: self.self_correction + rhs.self_correction,
            nonpolar: self.nonpolar + rhs.nonpolar,
        }
    }
}

impl AddAssign for SolvationTerms {
    fn add_assign(&mut self, rhs: Self) {
        self.polar_bonded += rhs.polar_bonded;
        self.polar_pairs += rhs.polar_pairs;
        self.self_correction += rhs.self_correction;
        self.nonpolar += rhs.nonpolar;
    }
}
