//! Elementary functions from power series
//!
//! Each function reduces its argument before summing a series, so the
//! series only ever sees small inputs: `exp` and `log` split off powers
//! of two, the trigonometric functions split off quarter turns.
//! Non-finite inputs follow the C conventions (NaN for a domain error,
//! infinities where the limit is infinite).

use std::f64::consts::{FRAC_2_PI, LN_2, SQRT_2};

/// Terms summed by every series
const TERMS: u32 = 20;

/// 2^52: every `f64` at least this large is integral
const INTEGRAL_LIMIT: f64 = 4_503_599_627_370_496.0;

/// 2^54, used to lift subnormals into the normal range
const TWO_POW_54: f64 = 18_014_398_509_481_984.0;

const MANTISSA_MASK: u64 = (1 << 52) - 1;
const EXPONENT_BIAS: i32 = 1023;

/// ln(f64::MAX)
const EXP_OVERFLOW: f64 = 709.782_712_893_384;
/// ln of the smallest subnormal, less half an ulp
const EXP_UNDERFLOW: f64 = -745.133_219_101_941_1;

// pi/2 in two parts; the high part has few enough bits that small
// multiples of it are exact
const FRAC_PI_2_HI: f64 = 1.570_796_326_734_125_6;
const FRAC_PI_2_LO: f64 = 6.077_100_506_506_192e-11;

/// Absolute value, clearing the sign of zeros and NaNs too
pub fn fabs(x: f64) -> f64 {
    f64::from_bits(x.to_bits() & !(1 << 63))
}

/// Square root by Newton iteration
///
/// Iteration starts at or above the root and stops as soon as a step
/// fails to decrease the estimate.
pub fn sqrt(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 || x.is_infinite() {
        return x;
    }

    let mut guess = if x > 1.0 { x } else { 1.0 };
    loop {
        let next = 0.5 * (guess + x / guess);
        if next >= guess {
            return guess;
        }
        guess = next;
    }
}

/// `x` as `m * 2^e` with `m` in [1, 2); `x` must be finite and positive
fn split_exponent(x: f64) -> (f64, i32) {
    let (x, lifted) = if x < f64::MIN_POSITIVE {
        (x * TWO_POW_54, 54)
    } else {
        (x, 0)
    };
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - EXPONENT_BIAS;
    let mantissa = f64::from_bits((bits & MANTISSA_MASK) | ((EXPONENT_BIAS as u64) << 52));
    (mantissa, exponent - lifted)
}

/// 2^k for k inside the normal exponent range
fn pow2(k: i32) -> f64 {
    f64::from_bits(((k + EXPONENT_BIAS) as u64) << 52)
}

/// Sum of y^n / n over odd n, i.e. atanh(y) for |y| < 1
fn atanh_series(y: f64) -> f64 {
    let y2 = y * y;
    let mut term = y;
    let mut sum = y;
    for i in 1..=TERMS {
        term *= y2;
        sum += term / (2 * i + 1) as f64;
    }
    sum
}

/// Natural logarithm
pub fn log(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    if x.is_infinite() {
        return x;
    }

    let (mut m, mut e) = split_exponent(x);
    if m > SQRT_2 {
        m *= 0.5;
        e += 1;
    }
    e as f64 * LN_2 + 2.0 * atanh_series((m - 1.0) / (m + 1.0))
}

/// e raised to `x`
pub fn exp(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    if x > EXP_OVERFLOW {
        return f64::INFINITY;
    }
    if x < EXP_UNDERFLOW {
        return 0.0;
    }

    let k = round(x / LN_2);
    let r = x - k * LN_2;
    let mut term = 1.0;
    let mut sum = 1.0;
    for i in 1..=TERMS {
        term *= r / i as f64;
        sum += term;
    }

    // k lies in -1075..=1024, so each half stays a normal power of two
    let k = k as i32;
    let half = k / 2;
    sum * pow2(half) * pow2(k - half)
}

fn powi(base: f64, n: i64) -> f64 {
    let mut result = 1.0;
    let mut factor = base;
    let mut bits = n.unsigned_abs();
    while bits > 0 {
        if bits & 1 == 1 {
            result *= factor;
        }
        factor *= factor;
        bits >>= 1;
    }
    if n < 0 {
        1.0 / result
    } else {
        result
    }
}

/// `base` raised to `exponent`
///
/// Integral exponents are done by repeated squaring and so work for
/// negative bases. Anything else goes through `exp(exponent *
/// log(base))`, which is a domain error for a negative base.
pub fn pow(base: f64, exponent: f64) -> f64 {
    if exponent == 0.0 || base == 1.0 {
        return 1.0;
    }
    if base.is_nan() || exponent.is_nan() {
        return f64::NAN;
    }
    if fabs(exponent) < INTEGRAL_LIMIT && exponent == trunc(exponent) {
        return powi(base, exponent as i64);
    }
    if base < 0.0 {
        return f64::NAN;
    }
    if base == 0.0 {
        return if exponent > 0.0 { 0.0 } else { f64::INFINITY };
    }
    exp(exponent * log(base))
}

/// Quadrant and remainder of `x` in quarter turns, |remainder| <= pi/4
///
/// Accuracy falls off once `x` runs to millions of turns.
fn quarter_turns(x: f64) -> (u8, f64) {
    let n = round(x * FRAC_2_PI);
    let r = (x - n * FRAC_PI_2_HI) - n * FRAC_PI_2_LO;
    let quadrant = (n % 4.0 + 4.0) % 4.0;
    (quadrant as u8, r)
}

fn sin_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for i in 1..=TERMS {
        term *= -x2 / ((2 * i) * (2 * i + 1)) as f64;
        sum += term;
    }
    sum
}

fn cos_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = 1.0;
    let mut sum = 1.0;
    for i in 1..=TERMS {
        term *= -x2 / ((2 * i - 1) * (2 * i)) as f64;
        sum += term;
    }
    sum
}

/// Sine of `x` radians
pub fn sin(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    match quarter_turns(x) {
        (0, r) => sin_series(r),
        (1, r) => cos_series(r),
        (2, r) => -sin_series(r),
        (_, r) => -cos_series(r),
    }
}

/// Cosine of `x` radians
pub fn cos(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    match quarter_turns(x) {
        (0, r) => cos_series(r),
        (1, r) => -sin_series(r),
        (2, r) => -cos_series(r),
        (_, r) => sin_series(r),
    }
}

/// Tangent of `x` radians
pub fn tan(x: f64) -> f64 {
    sin(x) / cos(x)
}

/// `x` with its fraction dropped
pub fn trunc(x: f64) -> f64 {
    if !x.is_finite() || fabs(x) >= INTEGRAL_LIMIT {
        return x;
    }
    x as i64 as f64
}

/// Largest integral value not above `x`
pub fn floor(x: f64) -> f64 {
    let t = trunc(x);
    if t > x {
        t - 1.0
    } else {
        t
    }
}

/// Smallest integral value not below `x`
pub fn ceil(x: f64) -> f64 {
    let t = trunc(x);
    if t < x {
        t + 1.0
    } else {
        t
    }
}

/// Nearest integral value, halfway cases away from zero
pub fn round(x: f64) -> f64 {
    let t = trunc(x);
    let fraction = x - t;
    if fraction >= 0.5 {
        t + 1.0
    } else if fraction <= -0.5 {
        t - 1.0
    } else {
        t
    }
}
