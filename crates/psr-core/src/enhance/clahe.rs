//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a `tiles × tiles` grid. Each tile gets a
//! clipped-histogram equalization LUT; each output cell is the bilinear
//! blend of the LUTs of the four nearest tile centres. Tiles that overhang
//! the image read mirrored (reflect-101) samples so every tile has the same
//! area, which keeps a uniform input uniform.

use crate::border::reflect101;
use crate::grid::IntensityGrid;

const HIST_SIZE: usize = 256;

/// Apply CLAHE with the given clip limit and square tile grid.
///
/// The tile count per axis is capped at the axis length so tiles are at
/// least one cell wide. Caller guarantees a non-degenerate grid.
pub fn apply_clahe(grid: &IntensityGrid, clip_limit: f32, tiles: usize) -> IntensityGrid {
    let (rows, cols) = grid.shape();
    let tiles_x = tiles.clamp(1, cols);
    let tiles_y = tiles.clamp(1, rows);
    let tile_w = cols.div_ceil(tiles_x);
    let tile_h = rows.div_ceil(tiles_y);
    let tile_area = tile_w * tile_h;

    // Clip ceiling per bin, never below one sample.
    let clip = ((clip_limit as f64 * tile_area as f64 / HIST_SIZE as f64) as usize).max(1);
    let lut_scale = 255.0 / tile_area as f64;

    let mut luts = vec![[0u8; HIST_SIZE]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; HIST_SIZE];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let r = reflect101(y as isize, rows);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let c = reflect101(x as isize, cols);
                    hist[grid.get(r, c) as usize] += 1;
                }
            }
            clip_histogram(&mut hist, clip);
            luts[ty * tiles_x + tx] = equalization_lut(&hist, lut_scale);
        }
    }

    let inv_tw = 1.0 / tile_w as f64;
    let inv_th = 1.0 / tile_h as f64;

    let mut out = grid.clone();
    for r in 0..rows {
        let tyf = r as f64 * inv_th - 0.5;
        let (ty1, ty2, ya) = neighbours(tyf, tiles_y);
        for c in 0..cols {
            let txf = c as f64 * inv_tw - 0.5;
            let (tx1, tx2, xa) = neighbours(txf, tiles_x);
            let v = grid.get(r, c) as usize;

            let top = luts[ty1 * tiles_x + tx1][v] as f64 * (1.0 - xa)
                + luts[ty1 * tiles_x + tx2][v] as f64 * xa;
            let bottom = luts[ty2 * tiles_x + tx1][v] as f64 * (1.0 - xa)
                + luts[ty2 * tiles_x + tx2][v] as f64 * xa;
            let blended = top * (1.0 - ya) + bottom * ya;
            out.set(r, c, blended.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Lower/upper tile index and blend weight for a fractional tile coordinate.
fn neighbours(t: f64, n_tiles: usize) -> (usize, usize, f64) {
    let t1 = t.floor();
    let weight = t - t1;
    let lo = t1.max(0.0) as usize;
    let hi = ((t1 + 1.0).max(0.0) as usize).min(n_tiles - 1);
    (lo.min(n_tiles - 1), hi, weight)
}

/// Clip bins at `clip` and spread the excess evenly, remainder stepped
/// across the histogram from bin 0.
fn clip_histogram(hist: &mut [usize; HIST_SIZE], clip: usize) {
    let mut excess = 0usize;
    for h in hist.iter_mut() {
        if *h > clip {
            excess += *h - clip;
            *h = clip;
        }
    }

    let batch = excess / HIST_SIZE;
    let mut residual = excess - batch * HIST_SIZE;
    for h in hist.iter_mut() {
        *h += batch;
    }
    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

fn equalization_lut(hist: &[usize; HIST_SIZE], scale: f64) -> [u8; HIST_SIZE] {
    let mut lut = [0u8; HIST_SIZE];
    let mut sum = 0usize;
    for (i, &h) in hist.iter().enumerate() {
        sum += h;
        lut[i] = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
