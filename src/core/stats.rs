// stats.rs - Robust statistics and least-squares helpers

/// A sorted copy of a sample, for repeated percentile queries
#[derive(Debug, Clone)]
pub struct SortedSample {
    values: Vec<f64>,
}

impl SortedSample {
    pub fn new(data: &[f64]) -> Self {
        let mut values = data.to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Percentile `q` in [0, 100] with linear interpolation between closest
    /// ranks. Empty samples yield 0.
    pub fn percentile(&self, q: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let rank = (n - 1) as f64 * q.clamp(0.0, 100.0) / 100.0;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        self.values[lo] + frac * (self.values[hi] - self.values[lo])
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }
}

pub fn percentile(data: &[f64], q: f64) -> f64 {
    SortedSample::new(data).percentile(q)
}

pub fn median(data: &[f64]) -> f64 {
    percentile(data, 50.0)
}

/// Median absolute deviation around the median
pub fn mad(data: &[f64]) -> f64 {
    let center = median(data);
    let deviations: Vec<f64> = data.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    (data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Trapezoidal integral with unit spacing
pub fn trapezoid(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[0] + w[1]) * 0.5).sum()
}

/// Result of a first-degree least-squares fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least-squares line through `(xs, ys)`.
/// `None` with fewer than two points or no spread in `xs`.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
    })
}

/// `count` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}
