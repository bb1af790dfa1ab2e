//! Decibel / linear power arithmetic.
//!
//! Every power summation in the crate happens in the linear domain and is
//! converted back to dB afterwards. Two conventions keep the edge cases
//! consistent:
//!
//! - `to_linear(-inf) == 0.0` (an idle transmitter contributes nothing)
//! - `to_db(x) == -inf` for any `x <= 0.0` (no capacity left)

/// Convert a dB quantity to linear scale.
#[inline]
pub fn to_linear(db: f64) -> f64 {
    if db == f64::NEG_INFINITY {
        0.0
    } else {
        10f64.powf(db / 10.0)
    }
}

/// Convert a linear quantity to dB; non-positive inputs map to `-inf`.
#[inline]
pub fn to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * linear.log10()
    }
}

/// Add two dB powers in the linear domain.
#[inline]
pub fn add_db(a: f64, b: f64) -> f64 {
    to_db(to_linear(a) + to_linear(b))
}

/// Sum an iterator of dB powers in the linear domain.
pub fn sum_db<I>(powers: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    to_db(powers.into_iter().map(to_linear).sum())
}

/// Shannon capacity in bit/s for a bandwidth (Hz) and SINR (dB).
pub fn shannon_rate(bandwidth_hz: f64, sinr_db: f64) -> f64 {
    bandwidth_hz * (1.0 + to_linear(sinr_db)).log2()
}
