use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Table scale must be positive and finite, got {0}")]
    InvalidScale(f64),
    #[error("Table extent must be positive and finite, got {0}")]
    InvalidExtent(f64),
    #[error("Raw table length {0} is not a non-zero multiple of 4")]
    MalformedData(usize),
    #[error("Table lookup at scaled position {position} is outside the tabulated range [0, {limit})")]
    OutOfRange { position: f64, limit: f64 },
}

/// The interpolated kernel value and its derivative with respect to the fractional offset
/// within the table interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableLookup {
    pub value: f64,
    pub derivative: f64,
}

/// The tabulated GB kernel `f(x) = 1/sqrt(x² + exp(-x²/4))`, stored as cubic spline
/// quadruplets `(Y, F, G, H)` per interval of width `1/scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct GbTable {
    scale: f64,
    data: Vec<f64>,
}

impl GbTable {
    /// Tabulates the kernel over `x ∈ [0, extent]` with `scale` points per unit of `x`.
    pub fn generate(scale: f64, extent: f64) -> Result<Self, TableError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(TableError::InvalidScale(scale));
        }
        if !(extent.is_finite() && extent > 0.0) {
            return Err(TableError::InvalidExtent(extent));
        }

        let intervals = (extent * scale).ceil() as usize;
        let h = 1.0 / scale;
        let mut data = Vec::with_capacity(4 * intervals);

        for n in 0..intervals {
            let x0 = n as f64 * h;
            let x1 = x0 + h;
            let (f0, d0) = kernel(x0);
            let (f1, d1) = kernel(x1);

            data.push(f0);
            data.push(d0 * h);
            data.push(3.0 * (f1 - f0) - 2.0 * d0 * h - d1 * h);
            data.push(-2.0 * (f1 - f0) + (d0 + d1) * h);
        }

        Ok(Self { scale, data })
    }

    /// Wraps an externally produced table of `(Y, F, G, H)` quadruplets.
    pub fn from_raw(scale: f64, data: Vec<f64>) -> Result<Self, TableError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(TableError::InvalidScale(scale));
        }
        if data.is_empty() || data.len() % 4 != 0 {
            return Err(TableError::MalformedData(data.len()));
        }
        Ok(Self { scale, data })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of tabulated intervals.
    pub fn len(&self) -> usize {
        self.data.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interpolates at `rt`, a position already multiplied by the table scale.
    #[inline]
    pub fn evaluate(&self, rt: f64) -> Result<TableLookup, TableError> {
        let limit = self.len() as f64;
        if !(rt >= 0.0 && rt < limit) {
            return Err(TableError::OutOfRange {
                position: rt,
                limit,
            });
        }

        let n0 = rt.floor();
        let eps = rt - n0;
        let eps2 = eps * eps;
        let nnn = 4 * n0 as usize;

        let y = self.data[nnn];
        let f = self.data[nnn + 1];
        let geps = eps * self.data[nnn + 2];
        let heps2 = eps2 * self.data[nnn + 3];
        let fp = f + geps + heps2;

        Ok(TableLookup {
            value: y + eps * fp,
            derivative: fp + geps + 2.0 * heps2,
        })
    }
}

/// Returns the GB kernel and its derivative at `x`.
fn kernel(x: f64) -> (f64, f64) {
    let damp = (-0.25 * x * x).exp();
    let g = x * x + damp;
    let value = 1.0 / g.sqrt();
    let dg = 2.0 * x - 0.5 * x * damp;
    (value, -0.5 * value * value * value * dg)
}
