//! Local polynomial regression (loess) with tricube weights.

use serde::{Deserialize, Serialize};

/// Degree of the local polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalDegree {
    /// Locally weighted mean.
    Constant,
    /// Locally weighted straight line.
    Linear,
}

impl LocalDegree {
    fn order(self) -> usize {
        match self {
            LocalDegree::Constant => 0,
            LocalDegree::Linear => 1,
        }
    }
}

#[inline]
fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u * u;
        t * t * t
    }
}

/// Number of neighbours in each local fit for `n` points and `span`.
///
/// At least `degree + 2` so that `degree + 1` points keep a positive weight
/// after the farthest neighbour's weight drops to zero.
pub fn neighbourhood_size(n: usize, span: f64, degree: LocalDegree) -> usize {
    let q = (n as f64 * span).floor() as usize;
    q.max(degree.order() + 2).min(n)
}

/// Local fit evaluated at `x0` using the `q` nearest observations.
pub fn loess_at(x: &[f64], y: &[f64], x0: f64, q: usize, degree: LocalDegree) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if x.is_empty() {
        return f64::NAN;
    }

    let mut dist: Vec<f64> = x.iter().map(|xi| (xi - x0).abs()).collect();
    let q = q.clamp(1, x.len());
    let h = {
        let (_, kth, _) = dist.select_nth_unstable_by(q - 1, f64::total_cmp);
        *kth
    };
    for (d, xi) in dist.iter_mut().zip(x) {
        *d = (xi - x0).abs();
    }

    let mut sw = 0.0;
    let mut swx = 0.0;
    let mut swy = 0.0;
    let weights: Vec<f64> = dist
        .iter()
        .map(|&d| {
            if h > 0.0 {
                tricube(d / h)
            } else if d == 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    for ((&w, &xi), &yi) in weights.iter().zip(x).zip(y) {
        sw += w;
        swx += w * xi;
        swy += w * yi;
    }
    if sw <= 0.0 {
        return f64::NAN;
    }

    let x_bar = swx / sw;
    let y_bar = swy / sw;
    if degree == LocalDegree::Constant {
        return y_bar;
    }

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&w, &xi), &yi) in weights.iter().zip(x).zip(y) {
        sxx += w * (xi - x_bar) * (xi - x_bar);
        sxy += w * (xi - x_bar) * (yi - y_bar);
    }
    if sxx <= 1e-12 * sw {
        return y_bar;
    }
    y_bar + sxy / sxx * (x0 - x_bar)
}

/// Loess fitted values at every observation.
pub fn loess_fit(x: &[f64], y: &[f64], span: f64, degree: LocalDegree) -> Vec<f64> {
    let q = neighbourhood_size(x.len(), span, degree);
    x.iter().map(|&x0| loess_at(x, y, x0, q, degree)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<f64> {
        (-20..=20).map(|v| v as f64).collect()
    }

    #[test]
    fn test_neighbourhood_size() {
        assert_eq!(neighbourhood_size(41, 0.1, LocalDegree::Linear), 4);
        assert_eq!(neighbourhood_size(5, 0.1, LocalDegree::Linear), 3);
        assert_eq!(neighbourhood_size(2, 0.1, LocalDegree::Linear), 2);
    }

    #[test]
    fn test_reproduces_straight_line() {
        let x = axis();
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 0.01 * v).collect();
        let fit = loess_fit(&x, &y, 0.1, LocalDegree::Linear);
        for (f, t) in fit.iter().zip(&y) {
            assert!((f - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_stays_constant() {
        let x = axis();
        let y = vec![0.25; x.len()];
        let fit = loess_fit(&x, &y, 0.1, LocalDegree::Linear);
        assert!(fit.iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_interior_point_is_local_weighted_mean() {
        let x = axis();
        let y: Vec<f64> = x.iter().map(|&v| if v < 0.0 { 0.0 } else { 1.0 }).collect();
        let q = neighbourhood_size(x.len(), 0.1, LocalDegree::Linear);
        let v = loess_at(&x, &y, 0.0, q, LocalDegree::Linear);
        // neighbours -1, 0, 1 carry weight; -1 is 0.0, the other two 1.0
        assert!(v > y[19] && v <= y[21]);
    }

    #[test]
    fn test_evaluates_between_knots() {
        let x = axis();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let q = neighbourhood_size(x.len(), 0.1, LocalDegree::Linear);
        let v = loess_at(&x, &y, 0.5, q, LocalDegree::Linear);
        assert!((v - 1.0).abs() < 1e-12);
    }
}
