use std::f64::consts::PI;

/// Coulomb constant in kJ·nm/(mol·e²).
pub const ONE_4PI_EPS0: f64 = 138.935485;
pub const CAL2JOULE: f64 = 4.184;

pub const STILL_P1: f64 = 0.073 * 0.1;
pub const STILL_P2: f64 = 0.921 * 0.1 * CAL2JOULE;
pub const STILL_P3: f64 = 6.211 * 0.1 * CAL2JOULE;
pub const STILL_P4: f64 = 15.236 * 0.1 * CAL2JOULE;
pub const STILL_P5: f64 = 1.254;
pub const STILL_P5INV: f64 = 1.0 / STILL_P5;
pub const STILL_PIP5: f64 = PI * STILL_P5;

/// Bond lengths are stretched by this factor before computing 1-2 cap volumes.
pub const STILL_CAP_SCALE: f64 = 1.01;

pub const NONPOLAR_TERM: f64 = 4.0 * PI;

#[inline]
pub fn inv_sqrt(x: f64) -> f64 {
    1.0 / x.sqrt()
}

/// Evaluates the Still close-contact switch for a normalised squared distance
/// `ratio = d² / (ρi + ρj)²`, returning `(ccf, dccf)`.
///
/// Beyond `1/P5` the switch is fully on and has zero derivative.
#[inline]
pub fn still_switch(ratio: f64) -> (f64, f64) {
    if ratio > STILL_P5INV {
        return (1.0, 0.0);
    }
    let theta = ratio * STILL_PIP5;
    let cosq = theta.cos();
    let term = 0.5 * (1.0 - cosq);
    let ccf = term * term;
    let sinq = (1.0 - cosq * cosq).max(0.0);
    let dccf = 2.0 * term * sinq.sqrt() * STILL_PIP5 * ratio;
    (ccf, dccf)
}

/// Volume of the spherical cap of a sphere of radius `ri` cut off by a sphere of radius
/// `rj` whose centre lies at distance `r`.
#[inline]
pub fn cap_volume(ri: f64, rj: f64, r: f64) -> f64 {
    let ratio = (rj * rj - ri * ri - r * r) / (2.0 * ri * r);
    let h = ri * (1.0 + ratio);
    PI / 3.0 * h * h * (3.0 * ri - h)
}

/// The descreening contribution of one scaled partner sphere and its radial derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapTerm {
    /// The overlap integral; the HCT/OBC accumulators consume `0.5 * value`.
    pub value: f64,
    /// The derivative coefficient stored in the derivative buffer, already divided by `d`.
    pub dadx: f64,
}

/// Evaluates the HCT pairwise overlap integral of a partner sphere of scaled radius `sk` at
/// distance `d` from an atom with offset radius `rai`.
///
/// Returns `None` when the spheres do not interact: the partner is out of reach
/// (`d >= rai + sk`) or the atom is completely outside the partner (`rai >= d + sk`).
/// `ln` is the natural logarithm used for the `ln(u/l)` term.
#[inline]
pub fn overlap_integral<F>(d: f64, rai: f64, sk: f64, ln: F) -> Option<OverlapTerm>
where
    F: Fn(f64) -> f64,
{
    if !(rai < d + sk && d < rai + sk) {
        return None;
    }

    let rinv = 1.0 / d;
    let rai_inv = 1.0 / rai;

    let (lij, dlij) = if rai > d - sk {
        (rai_inv, 0.0)
    } else {
        (1.0 / (d - sk), 1.0)
    };
    let lij2 = lij * lij;
    let lij3 = lij2 * lij;

    let uij = 1.0 / (d + sk);
    let uij2 = uij * uij;
    let uij3 = uij2 * uij;

    let diff2 = uij2 - lij2;
    let sk2_rinv = sk * sk * rinv;
    let prod = 0.25 * sk2_rinv;
    let log_term = ln(uij / lij);

    let mut value = lij - uij + 0.25 * d * diff2 + 0.5 * rinv * log_term - prod * diff2;
    if rai < sk - d {
        value += 2.0 * (rai_inv - lij);
    }

    let t1 = 0.5 * lij2 + prod * lij3 - 0.25 * (lij * rinv + lij3 * d);
    let t2 = -0.5 * uij2 - 0.25 * sk2_rinv * uij3 + 0.25 * (uij * rinv + uij3 * d);
    let t3 = 0.125 * (1.0 + sk2_rinv * rinv) * (-diff2) + 0.25 * log_term * rinv * rinv;

    Some(OverlapTerm {
        value,
        dadx: (dlij * t1 + t2 + t3) * rinv,
    })
}
