//! Isotonic regression by pool-adjacent-violators.

/// Least-squares non-decreasing fit to `y` (equal weights).
pub fn isotonic_increasing(y: &[f64]) -> Vec<f64> {
    // (sum, count) per pooled block
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(y.len());

    for &v in y {
        blocks.push((v, 1));
        while blocks.len() >= 2 {
            let (s1, c1) = blocks[blocks.len() - 1];
            let (s0, c0) = blocks[blocks.len() - 2];
            if s0 / c0 as f64 > s1 / c1 as f64 {
                blocks.pop();
                let last = blocks.len() - 1;
                blocks[last] = (s0 + s1, c0 + c1);
            } else {
                break;
            }
        }
    }

    let mut out = Vec::with_capacity(y.len());
    for (sum, count) in blocks {
        let mean = sum / count as f64;
        out.extend(std::iter::repeat(mean).take(count));
    }
    out
}
