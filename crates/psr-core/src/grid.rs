use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 2D grid stored row-major. `width` is the column count, `height` the row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    /// Row-major cell values.
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

/// Single-channel 8-bit image.
pub type IntensityGrid = Grid<u8>;

/// Local standard deviation of intensity, one value per source cell.
pub type RoughnessField = Grid<f64>;

impl<T: Clone> Grid<T> {
    /// Create a new grid filled with the given value.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
        }
    }
}

impl<T> Grid<T> {
    /// Wrap row-major data. Fails if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "expected {} samples for a {height}x{width} grid, got {}",
                width * height,
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Build a grid from nested rows. All rows must share one length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(Error::InvalidInput(format!(
                "row {bad} has {} samples, expected {width}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            data: rows.into_iter().flatten().collect(),
            width,
            height,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                data.push(f(r, c));
            }
        }
        Self { data, width, height }
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get_ref(&self, row: usize, col: usize) -> &T {
        &self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            data: self.data.iter().map(f).collect(),
            width: self.width,
            height: self.height,
        }
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Reject grids with a zero dimension or inconsistent backing storage.
    pub fn ensure_non_degenerate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "grid has a degenerate shape {}x{}",
                self.height, self.width
            )));
        }
        if self.data.len() != self.width * self.height {
            return Err(Error::InvalidInput(format!(
                "grid storage holds {} samples but shape is {}x{}",
                self.data.len(),
                self.height,
                self.width
            )));
        }
        Ok(())
    }

    /// Row `r` as a slice.
    pub fn row(&self, r: usize) -> &[T] {
        &self.data[r * self.width..(r + 1) * self.width]
    }
}

impl<T: Copy> Grid<T> {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }
}

impl IntensityGrid {
    /// Borrow the samples as an `image` buffer for library kernels.
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        self.ensure_non_degenerate()?;
        GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .ok_or_else(|| Error::Computation("gray image buffer size mismatch".into()))
    }

    pub fn from_gray_image(img: GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self {
            data: img.into_raw(),
            width: w as usize,
            height: h as usize,
        }
    }

    pub fn min_value(&self) -> u8 {
        self.data.iter().copied().min().unwrap_or(0)
    }

    pub fn max_value(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// `255 - v` per cell.
    pub fn inverted(&self) -> Self {
        self.map(|&v| 255 - v)
    }
}

impl RoughnessField {
    /// Mean cell value; 0.0 for an empty field.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

/// Cell value marking an active mask cell, matching 8-bit mask images.
pub const MASK_ACTIVE: u8 = 255;

/// A two-state mask over a source grid. Cells are `0` or [`MASK_ACTIVE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryMask(Grid<u8>);

impl BinaryMask {
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        Self(Grid::from_fn(width, height, |r, c| {
            if f(r, c) { MASK_ACTIVE } else { 0 }
        }))
    }

    /// Any non-zero sample counts as active.
    pub fn from_grid(grid: &Grid<u8>) -> Self {
        Self(grid.map(|&v| if v > 0 { MASK_ACTIVE } else { 0 }))
    }

    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self> {
        let grid = Grid::from_rows(rows)?;
        Ok(Self(grid.map(|&a| if a { MASK_ACTIVE } else { 0 })))
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self(Grid::new(width, height, 0))
    }

    #[inline]
    pub fn is_active(&self, row: usize, col: usize) -> bool {
        self.0.get(row, col) > 0
    }

    pub fn active_count(&self) -> usize {
        self.0.data.iter().filter(|&&v| v > 0).count()
    }

    /// Active cells / total cells, 0.0 for an empty mask.
    pub fn active_fraction(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.active_count() as f64 / self.0.len() as f64
    }

    pub fn as_grid(&self) -> &Grid<u8> {
        &self.0
    }

    pub fn into_grid(self) -> Grid<u8> {
        self.0
    }

    pub fn width(&self) -> usize {
        self.0.width
    }

    pub fn height(&self) -> usize {
        self.0.height
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A (row, col) cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Max of the row and column offsets.
    pub fn chebyshev(&self, other: &Point) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }
}

/// Detected points in detection order.
pub type PointSet = Vec<Point>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = Grid::from_rows(vec![vec![1u8, 2], vec![3]]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        let g: IntensityGrid = Grid::new(0, 4, 0);
        assert!(g.ensure_non_degenerate().is_err());
        let g: IntensityGrid = Grid::new(3, 0, 0);
        assert!(g.ensure_non_degenerate().is_err());
        let bad = Grid { data: vec![1u8; 5], width: 2, height: 2 };
        assert!(bad.ensure_non_degenerate().is_err());
    }

    #[test]
    fn gray_image_round_trip_keeps_layout() {
        let g = Grid::from_rows(vec![vec![0u8, 10, 20], vec![30, 40, 50]]).unwrap();
        let img = g.to_gray_image().unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0[0], 50);
        assert_eq!(IntensityGrid::from_gray_image(img), g);
    }

    #[test]
    fn mask_counts_active_cells() {
        let m = BinaryMask::from_rows(vec![vec![true, false], vec![true, false]]).unwrap();
        assert_eq!(m.active_count(), 2);
        assert!((m.active_fraction() - 0.5).abs() < 1e-12);
        assert_eq!(m.as_grid().get(0, 0), MASK_ACTIVE);
        assert_eq!(BinaryMask::empty(0, 0).active_fraction(), 0.0);
    }

    #[test]
    fn chebyshev_distance() {
        assert_eq!(Point::new(2, 5).chebyshev(&Point::new(4, 1)), 4);
    }
}
