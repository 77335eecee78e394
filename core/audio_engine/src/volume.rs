/// Applies a linear gain to 16-bit samples in place, saturating at the
/// limits of `i16`. A gain of exactly 1.0 leaves the buffer untouched.
pub fn apply_volume(samples: &mut [i16], gain: f64) {
    if gain == 1.0 {
        return;
    }

    for sample in samples.iter_mut() {
        let scaled = (f64::from(*sample) * gain + 0.5) as i32;
        *sample = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_gain_is_noop() {
        let mut samples = [1, -1, 32767, -32768];
        apply_volume(&mut samples, 1.0);
        assert_eq!(samples, [1, -1, 32767, -32768]);
    }

    #[test]
    fn test_gain_saturates_instead_of_wrapping() {
        let mut samples = [20000, -20000];
        apply_volume(&mut samples, 2.0);
        assert_eq!(samples, [32767, -32768]);
    }

    #[test]
    fn test_half_gain() {
        let mut samples = [1000, 3, -1000];
        apply_volume(&mut samples, 0.5);
        // 1.5 + 0.5 -> 2, -500 + 0.5 -> -499.5 -> -499
        assert_eq!(samples, [500, 2, -499]);
    }

    #[test]
    fn test_zero_gain_silences() {
        let mut samples = [1234, -4321];
        apply_volume(&mut samples, 0.0);
        assert_eq!(samples, [0, 0]);
    }
}
