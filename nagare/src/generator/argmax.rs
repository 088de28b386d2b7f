/// Index of the largest value; the first occurrence wins ties.
///
/// NaN never wins. An empty slice yields 0.
pub fn simple_argmax(input: &[f32]) -> usize {
    input
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_index, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best_index, best_value)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_maximum_wins() {
        assert_eq!(simple_argmax(&[0.5, 2.0, -1.0, 2.0]), 1);
    }

    #[test]
    fn test_nan_is_skipped() {
        assert_eq!(simple_argmax(&[f32::NAN, 0.1, 0.3]), 2);
    }

    #[test]
    fn test_all_negative_infinity() {
        assert_eq!(simple_argmax(&[f32::NEG_INFINITY, f32::NEG_INFINITY]), 0);
    }
}
