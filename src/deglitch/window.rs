use crate::data::model::Sample;

/// Number of leading (and trailing) positions whose averaging window
/// cannot be fully populated.
pub fn edge_width(window_size: usize) -> usize {
    window_size / 2
}

/// Whether index `i` of a series of length `len` lies in the untrustworthy
/// edge region for `window_size`.
pub fn is_edge(i: usize, len: usize, window_size: usize) -> bool {
    let h = edge_width(window_size);
    i < h || i + h >= len
}

/// Centred moving average that tolerates missing samples.
///
/// Each output is the sum of the present values inside the window divided
/// by how many values were present. Windows are clipped at the series
/// ends, so edge positions average fewer points. An all-missing window
/// yields `0.0`; such positions are never trusted by the detectors.
pub fn moving_average(data: &[Sample], window_size: usize) -> Vec<f64> {
    let n = data.len();
    let h = edge_width(window_size.max(1));

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(h);
            let hi = (i + h + 1).min(n);
            let (sum, count) = data[lo..hi]
                .iter()
                .flatten()
                .fold((0.0_f64, 0usize), |(s, c), v| (s + *v, c + 1));
            sum / count.max(1) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn present(values: &[f64]) -> Vec<Sample> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn interior_uses_full_window() {
        let data = present(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let avg = moving_average(&data, 3);
        assert_eq!(avg.len(), data.len());
        assert_abs_diff_eq!(avg[1], 2.0);
        assert_abs_diff_eq!(avg[3], 4.0);
        assert_abs_diff_eq!(avg[5], 6.0);
        // Clipped edges average the points that exist.
        assert_abs_diff_eq!(avg[0], 1.5);
        assert_abs_diff_eq!(avg[6], 6.5);
    }

    #[test]
    fn missing_values_shrink_the_denominator() {
        let data = vec![Some(1.0), None, Some(3.0), Some(5.0), None];
        let avg = moving_average(&data, 3);
        assert_abs_diff_eq!(avg[0], 1.0);
        assert_abs_diff_eq!(avg[1], 2.0);
        assert_abs_diff_eq!(avg[2], 4.0);
        assert_abs_diff_eq!(avg[3], 4.0);
        assert_abs_diff_eq!(avg[4], 5.0);
    }

    #[test]
    fn all_missing_window_does_not_divide_by_zero() {
        let data = vec![None, None, None, Some(4.0)];
        let avg = moving_average(&data, 3);
        assert_eq!(avg[0], 0.0);
        assert!(avg.iter().all(|v| v.is_finite()));
        assert!(moving_average(&[], 5).is_empty());
    }

    #[test]
    fn edge_region_matches_half_window() {
        let flags: Vec<bool> = (0..10).map(|i| is_edge(i, 10, 5)).collect();
        assert_eq!(
            flags,
            vec![true, true, false, false, false, false, false, false, true, true]
        );
        assert!((0..4).all(|i| !is_edge(i, 4, 1)));
    }
}
