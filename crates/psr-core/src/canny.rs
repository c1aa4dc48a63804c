//! Canny edge detection on an image the caller has already smoothed.
//!
//! Sobel gradients, non-maximum suppression along the quantized gradient
//! direction, then hysteresis from strong cells into 8-connected weak ones.
//! Cells on the outer border are never edges.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// Row-major edge flags for `smoothed`.
pub(crate) fn canny(smoothed: &GrayImage, low: f32, high: f32) -> Vec<bool> {
    let (w, h) = (smoothed.width() as usize, smoothed.height() as usize);
    let gx: Vec<f32> = horizontal_sobel(smoothed).pixels().map(|p| p.0[0] as f32).collect();
    let gy: Vec<f32> = vertical_sobel(smoothed).pixels().map(|p| p.0[0] as f32).collect();
    let magnitude: Vec<f32> = gx.iter().zip(&gy).map(|(x, y)| x.hypot(*y)).collect();

    let thin = suppress_non_maxima(&magnitude, &gx, &gy, w, h);
    hysteresis(&thin, w, h, low, high)
}

// ── Non-maximum suppression ──────────────────────────────────────────────────

fn suppress_non_maxima(mag: &[f32], gx: &[f32], gy: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    for r in 1..h - 1 {
        for c in 1..w - 1 {
            let i = r * w + c;
            let m = mag[i];
            if m == 0.0 {
                continue;
            }
            let mut angle = gy[i].atan2(gx[i]).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            // Neighbour offsets along the gradient; +y points down.
            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (i - 1, i + 1)
            } else if angle < 67.5 {
                (i - w - 1, i + w + 1)
            } else if angle < 112.5 {
                (i - w, i + w)
            } else {
                (i - w + 1, i + w - 1)
            };
            if m >= mag[a] && m >= mag[b] {
                out[i] = m;
            }
        }
    }
    out
}

// ── Hysteresis ───────────────────────────────────────────────────────────────

fn hysteresis(thin: &[f32], w: usize, h: usize, low: f32, high: f32) -> Vec<bool> {
    let mut edges = vec![false; w * h];
    let mut stack = Vec::new();
    for (i, &m) in thin.iter().enumerate() {
        if m > 0.0 && m >= high && !edges[i] {
            edges[i] = true;
            stack.push(i);
            while let Some(j) = stack.pop() {
                let (r, c) = (j / w, j % w);
                for nr in r.saturating_sub(1)..=(r + 1).min(h - 1) {
                    for nc in c.saturating_sub(1)..=(c + 1).min(w - 1) {
                        let k = nr * w + nc;
                        if !edges[k] && thin[k] > 0.0 && thin[k] >= low {
                            edges[k] = true;
                            stack.push(k);
                        }
                    }
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn step_edge_is_thin_and_interior() {
        let img = GrayImage::from_fn(10, 6, |x, _| Luma([if x < 5 { 0 } else { 200 }]));
        let edges = canny(&img, 50.0, 100.0);
        for r in 0..6 {
            for c in 0..10 {
                let on = edges[r * 10 + c];
                if r == 0 || r == 5 {
                    assert!(!on, "border row {r}");
                } else {
                    assert_eq!(on, c == 4 || c == 5, "({r}, {c})");
                }
            }
        }
    }

    #[test]
    fn weak_cells_need_a_strong_neighbour() {
        // Two vertical steps: a faint one (gradient 4·20) and a strong one (4·100).
        let img = GrayImage::from_fn(16, 8, |x, _| {
            Luma([if x < 4 { 0 } else if x < 10 { 20 } else { 120 }])
        });
        let weak_only = canny(&img, 50.0, 500.0);
        assert!(weak_only.iter().all(|&e| !e));
        let edges = canny(&img, 50.0, 300.0);
        assert!(edges[3 * 16 + 9]);
        assert!(!edges[3 * 16 + 3]);
    }

    #[test]
    fn tiny_images_have_no_edges() {
        let img = GrayImage::from_fn(2, 2, |x, _| Luma([(x * 200) as u8]));
        assert!(canny(&img, 1.0, 2.0).iter().all(|&e| !e));
    }
}
