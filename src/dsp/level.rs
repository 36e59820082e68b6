//! Decibel / linear amplitude conversion.

/// Convert decibels to linear gain (`10^(db/20)`)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels (`20·log10(|x|)`)
///
/// Returns negative infinity for silence.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    let magnitude = linear.abs();
    if magnitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * magnitude.log10()
    }
}

/// Convert a mean-square power value to decibels (`10·log10(p)`)
#[inline]
pub fn power_to_db(power: f64) -> f64 {
    if power <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * power.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_over_fader_range() {
        let mut db = -60.0f32;
        while db <= 12.0 {
            let back = linear_to_db(db_to_linear(db));
            assert!((back - db).abs() < 1e-3, "{} came back as {}", db, back);
            db += 0.25;
        }
    }

    #[test]
    fn test_silence_is_negative_infinity() {
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
        assert_eq!(power_to_db(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_half_amplitude() {
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((linear_to_db(-0.5) + 6.0206).abs() < 1e-3);
    }
}
