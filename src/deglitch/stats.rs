use crate::data::model::Sample;

/// Population standard deviation of the present values.
///
/// `None` when nothing is present.
pub fn std_dev(values: &[Sample]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    population_std(&present)
}

fn population_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Median of the present values, `None` when nothing is present.
pub fn median(values: &[Sample]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Trailing rolling sample standard deviation (n − 1 denominator).
///
/// Position `i` covers `i + 1 - window_size ..= i`. A window with fewer
/// than two present values is undefined. The first `window_size - 1`
/// positions take the value of the first full window.
pub fn rolling_std(values: &[Sample], window_size: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let w = window_size.max(1);
    if n < w {
        return vec![None; n];
    }

    let mut out = vec![None; n];
    for i in (w - 1)..n {
        let window: Vec<f64> = values[i + 1 - w..=i].iter().flatten().copied().collect();
        if window.len() < 2 {
            continue;
        }
        let k = window.len() as f64;
        let mean = window.iter().sum::<f64>() / k;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (k - 1.0);
        out[i] = Some(var.sqrt());
    }

    let first = out[w - 1];
    for slot in out.iter_mut().take(w - 1) {
        *slot = first;
    }
    out
}

/// Replace exploded rolling-std values by the median rolling std.
///
/// A value is exploded when it exceeds `median + 3 * std` of all defined
/// rolling values. Returns the median used, if any value was defined.
pub fn clamp_exploded(rolling: &mut [Option<f64>]) -> Option<f64> {
    let med = median(rolling)?;
    let spread = std_dev(rolling)?;
    let limit = med + 3.0 * spread;
    for v in rolling.iter_mut().flatten() {
        if *v > limit {
            *v = med;
        }
    }
    Some(med)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn std_ignores_missing() {
        let values = vec![Some(2.0), None, Some(4.0), Some(4.0), Some(4.0), None, Some(5.0), Some(5.0), Some(7.0), Some(9.0)];
        assert_abs_diff_eq!(std_dev(&values).unwrap(), 2.0);
        assert_eq!(std_dev(&[None, None]), None);
        assert_eq!(std_dev(&[Some(3.0), Some(3.0)]), Some(0.0));
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None]), None);
    }

    #[test]
    fn rolling_std_fills_leading_positions() {
        let values: Vec<Sample> = [1.0, 2.0, 3.0, 5.0, 8.0].iter().copied().map(Some).collect();
        let rolling = rolling_std(&values, 3);
        assert_eq!(rolling.len(), 5);
        assert_abs_diff_eq!(rolling[2].unwrap(), 1.0);
        assert_eq!(rolling[0], rolling[2]);
        assert_eq!(rolling[1], rolling[2]);
        // [3, 5, 8]: mean 16/3, sample variance 19/3
        assert_abs_diff_eq!(rolling[4].unwrap(), (19.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rolling_std_undefined_when_window_too_sparse() {
        let values = vec![Some(1.0), None, None, Some(2.0), Some(4.0)];
        let rolling = rolling_std(&values, 3);
        assert_eq!(rolling[2], None);
        assert_eq!(rolling[0], None);
        assert_eq!(rolling[3], None);
        assert!(rolling[4].is_some());
        assert_eq!(rolling_std(&values, 9), vec![None; 5]);
    }

    #[test]
    fn clamp_replaces_only_exploded_values() {
        let mut rolling: Vec<Option<f64>> = (0..20).map(|i| Some(1.0 + 0.01 * i as f64)).collect();
        rolling[7] = Some(500.0);
        rolling[8] = None;
        let med = clamp_exploded(&mut rolling).unwrap();
        assert_eq!(rolling[7], Some(med));
        assert_eq!(rolling[8], None);
        assert_eq!(rolling[0], Some(1.0));
        assert!(rolling.iter().flatten().all(|v| *v < 2.0));
    }
}
