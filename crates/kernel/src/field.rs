//! Scalar fields sampled on a regular grid of points.
//!
//! Used to probe density and pressure over the whole domain, independent of
//! where particles happen to sit.

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Row-major grid of samples. Sample `(col, row)` was taken at
/// `(col * spacing, row * spacing)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    width: usize,
    height: usize,
    spacing: f32,
    values: Vec<f32>,
}

/// Summary of a sampled field.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldStats {
    /// Smallest sample.
    pub min: f32,
    /// Largest sample.
    pub max: f32,
    /// Mean over all samples.
    pub mean: f64,
    /// Sum of all samples.
    pub total: f64,
}

impl ScalarField {
    /// Evaluate `f` at every sample point in `[0, width) x [0, height)`.
    ///
    /// Rows are evaluated in parallel on the current rayon pool.
    pub fn sample<F>(width: f32, height: f32, spacing: f32, f: F) -> Result<Self>
    where
        F: Fn([f32; 2]) -> f32 + Sync,
    {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(Error::InvalidParam(format!(
                "field spacing must be > 0, got {spacing}"
            )));
        }
        if !(width.is_finite() && height.is_finite()) {
            return Err(Error::InvalidParam("field extent must be finite".into()));
        }
        let cols = (width.max(0.0) / spacing).ceil() as usize;
        let rows = (height.max(0.0) / spacing).ceil() as usize;

        let mut values = vec![0.0f32; cols * rows];
        if cols > 0 {
            values.par_chunks_mut(cols).enumerate().for_each(|(row, line)| {
                let py = row as f32 * spacing;
                for (col, v) in line.iter_mut().enumerate() {
                    *v = f([col as f32 * spacing, py]);
                }
            });
        }

        Ok(Self {
            width: cols,
            height: rows,
            spacing,
            values,
        })
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Distance between neighboring samples.
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// All samples, row-major.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Sample at `(col, row)`.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.values[row * self.width + col])
    }

    /// A field on the same grid with `f` applied to every sample.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        Self {
            width: self.width,
            height: self.height,
            spacing: self.spacing,
            values: self.values.par_iter().map(|&v| f(v)).collect(),
        }
    }

    /// Min, max, mean and total. All zero for an empty field.
    pub fn stats(&self) -> FieldStats {
        if self.values.is_empty() {
            return FieldStats::default();
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut total = 0.0f64;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
            total += v as f64;
        }
        FieldStats {
            min,
            max,
            mean: total / self.values.len() as f64,
            total,
        }
    }
}
