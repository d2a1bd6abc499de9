// signal.rs - Smoothing and local-maximum search on sampled traces
//
// Semantics follow the usual SciPy conventions: `savgol_filter` with
// polynomial edge fitting, and `find_peaks` style maxima selection
// (plateau midpoints, height -> distance -> prominence filtering).

/// Solve `a * x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Weights that evaluate, at offset `t`, the degree-`degree` least-squares
/// polynomial through a window of positions `-half..=half`.
fn poly_weights(half: usize, degree: usize, t: f64) -> Option<Vec<f64>> {
    let positions: Vec<f64> = (0..=2 * half).map(|i| i as f64 - half as f64).collect();
    let terms = degree + 1;

    let mut normal = vec![vec![0.0; terms]; terms];
    for &x in &positions {
        for (r, row) in normal.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell += x.powi((r + c) as i32);
            }
        }
    }
    let rhs: Vec<f64> = (0..terms).map(|j| t.powi(j as i32)).collect();
    let z = solve(normal, rhs)?;

    Some(
        positions
            .iter()
            .map(|&x| (0..terms).map(|j| x.powi(j as i32) * z[j]).sum())
            .collect(),
    )
}

/// Savitzky-Golay smoothing. Samples within half a window of either end are
/// taken from a polynomial fitted to the first/last full window.
///
/// Returns the input unchanged when the window is even, not larger than
/// the degree, or longer than the data.
pub fn savgol_filter(data: &[f64], window: usize, degree: usize) -> Vec<f64> {
    let n = data.len();
    if window % 2 == 0 || window <= degree || window > n {
        return data.to_vec();
    }
    let half = window / 2;
    let apply = |weights: &[f64], start: usize| -> f64 {
        weights
            .iter()
            .zip(&data[start..start + window])
            .map(|(w, v)| w * v)
            .sum()
    };

    let Some(center) = poly_weights(half, degree, 0.0) else {
        return data.to_vec();
    };
    let mut out: Vec<f64> = (0..n)
        .map(|i| {
            if i >= half && i + half < n {
                apply(&center, i - half)
            } else {
                data[i]
            }
        })
        .collect();

    for i in 0..half {
        let left = poly_weights(half, degree, i as f64 - half as f64);
        let right = poly_weights(half, degree, (i + 1) as f64);
        if let (Some(left), Some(right)) = (left, right) {
            out[i] = apply(&left, 0);
            out[n - half + i] = apply(&right, n - window);
        }
    }
    out
}

/// Interior local maxima; flat tops report their midpoint (rounded down)
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a taller kept peak.
/// Ties in height favour the leftmost peak.
pub fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(a.cmp(&b)));

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Topographic prominence of a peak and the bases it was measured from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub value: f64,
    pub left_base: usize,
    pub right_base: usize,
}

pub fn prominence(x: &[f64], peak: usize) -> Prominence {
    let top = x[peak];

    let mut left_min = top;
    let mut left_base = peak;
    let mut i = peak as isize;
    while i >= 0 && x[i as usize] <= top {
        if x[i as usize] < left_min {
            left_min = x[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let mut right_min = top;
    let mut right_base = peak;
    let mut i = peak;
    while i < x.len() && x[i] <= top {
        if x[i] < right_min {
            right_min = x[i];
            right_base = i;
        }
        i += 1;
    }

    Prominence {
        value: top - left_min.max(right_min),
        left_base,
        right_base,
    }
}

/// Width at `rel_height` of the prominence, with linear interpolation
pub fn peak_width(x: &[f64], peak: usize, prom: &Prominence, rel_height: f64) -> f64 {
    let height = x[peak] - prom.value * rel_height;

    let mut i = peak;
    while prom.left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < height && i + 1 < x.len() {
        left += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < prom.right_base && height < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < height && i > 0 {
        right -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    right - left
}

/// Thresholds for `find_peaks`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakCriteria {
    pub min_height: f64,
    pub min_distance: usize,
    pub min_prominence: f64,
}

/// A maximum that passed every criterion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoundPeak {
    pub position: usize,
    pub prominence: f64,
    pub width: f64,
}

/// Local maxima of `x` filtered by height, then distance, then prominence
pub fn find_peaks(x: &[f64], criteria: &PeakCriteria) -> Vec<FoundPeak> {
    let tall: Vec<usize> = local_maxima(x)
        .into_iter()
        .filter(|&p| x[p] >= criteria.min_height)
        .collect();
    let spaced = select_by_distance(x, &tall, criteria.min_distance);

    spaced
        .into_iter()
        .filter_map(|position| {
            let prom = prominence(x, position);
            (prom.value >= criteria.min_prominence).then(|| FoundPeak {
                position,
                prominence: prom.value,
                width: peak_width(x, position, &prom, 0.5),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savgol_preserves_cubic() {
        let data: Vec<f64> = (0..40)
            .map(|i| {
                let t = i as f64;
                0.01 * t.powi(3) - 0.5 * t.powi(2) + 2.0 * t + 7.0
            })
            .collect();
        let smoothed = savgol_filter(&data, 11, 3);
        for (a, b) in data.iter().zip(&smoothed) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_savgol_reduces_alternating_noise() {
        let data: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let smoothed = savgol_filter(&data, 7, 3);
        let before: f64 = data[10..40].iter().map(|v| v.abs()).sum();
        let after: f64 = smoothed[10..40].iter().map(|v| v.abs()).sum();
        assert!(after < before * 0.5);
    }

    #[test]
    fn test_savgol_rejects_bad_windows() {
        let data = vec![1.0, 5.0, 2.0];
        assert_eq!(savgol_filter(&data, 4, 3), data);
        assert_eq!(savgol_filter(&data, 5, 3), data);
    }

    #[test]
    fn test_local_maxima_and_plateaus() {
        let x = [0.0, 2.0, 0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 5.0];
        // index 8 is an edge and never a maximum
        assert_eq!(local_maxima(&x), vec![1, 5]);
        let plateau = [0.0, 4.0, 4.0, 0.0];
        assert_eq!(local_maxima(&plateau), vec![1]);
    }

    #[test]
    fn test_select_by_distance_keeps_tallest() {
        let mut x = vec![0.0; 30];
        x[5] = 3.0;
        x[9] = 5.0;
        x[20] = 1.0;
        let kept = select_by_distance(&x, &[5, 9, 20], 10);
        assert_eq!(kept, vec![9, 20]);
    }

    #[test]
    fn test_prominence_and_width() {
        let x = [0.0, 1.0, 0.0, 3.0, 1.0, 0.0];
        let small = prominence(&x, 1);
        assert_eq!(small.value, 1.0);

        let big = prominence(&x, 3);
        assert_eq!(big.value, 3.0);
        assert_eq!(big.left_base, 2);
        assert_eq!(big.right_base, 5);
        assert!((peak_width(&x, 3, &big, 0.5) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_find_peaks_applies_all_criteria() {
        let mut x = vec![0.0; 100];
        for (center, height) in [(20usize, 10.0), (24, 8.0), (60, 2.0), (80, 9.0)] {
            x[center] = height;
            x[center - 1] = height / 2.0;
            x[center + 1] = height / 2.0;
        }
        let found = find_peaks(
            &x,
            &PeakCriteria {
                min_height: 3.0,
                min_distance: 10,
                min_prominence: 1.0,
            },
        );
        let positions: Vec<usize> = found.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![20, 80]);
        assert_eq!(found[0].prominence, 10.0);
    }
}
