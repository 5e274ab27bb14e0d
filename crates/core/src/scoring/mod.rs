pub mod aggregate;
pub mod balance;
pub mod growth;
pub mod historic;
pub mod margins;
pub mod multiples;
pub mod peer_multiples;

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `num / den`, undefined when either side is missing, the denominator is zero or
/// the quotient is not finite.
pub fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let (num, den) = (num?, den?);
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_zero_and_missing() {
        assert_eq!(ratio(Some(1.0), Some(4.0)), Some(0.25));
        assert_eq!(ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(ratio(None, Some(1.0)), None);
        assert_eq!(ratio(Some(f64::INFINITY), Some(1.0)), None);
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(1.285714), 1.29);
        assert_eq!(round2(-0.125), -0.13);
    }
}
