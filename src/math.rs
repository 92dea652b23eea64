/// Sign of `x` as `-1.0`, `0.0` or `1.0`.
///
/// Unlike [`f64::signum`], zero (of either sign) maps to `0.0`.
#[inline(always)]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Subtracts `amount` from `w` without letting the result cross zero.
///
/// A positive weight ends up in `[0, ∞)`, a negative one in `(-∞, 0]`, and zero stays zero.
#[inline(always)]
pub fn shrink_toward_zero(w: f64, amount: f64) -> f64 {
    let v = w - amount;
    if w > 0.0 {
        v.max(0.0)
    } else if w < 0.0 {
        v.min(0.0)
    } else {
        0.0
    }
}

#[inline(always)]
pub fn is_finite_nonzero(x: f64) -> bool {
    x.is_finite() && x != 0.0
}
