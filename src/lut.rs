//! Transparent colormap lookup tables for statistical overlays
//!
//! A [`ColormapSpec`] describes where a base colormap should sit on the data
//! axis. In sequential mode the thresholds are `[fmin, fmid, fmax]`: values
//! below `fmin` fade out, `fmid` lands on the middle of the base colormap and
//! `fmax` on its top. In diverging mode the thresholds are distances from
//! `center`, giving the seven control points
//!
//! ```text
//! center-fmax  center-fmid  center-fmin  center  center+fmin  center+fmid  center+fmax
//! ```
//!
//! Values within `fmin` of the center are transparent, and each side of the
//! base colormap is stretched to its own half.
//!
//! The builder works in 8-bit space internally (base samples are rounded to
//! `0..=255`) so tables match what a renderer uploads as its color table.

use std::ops::Index;

use egui::{Color32, ColorImage};
use serde::{Deserialize, Serialize};

use crate::colormap::{to_color32, Colormap, Rgba};
use crate::error::{BrainError, Result};

/// Number of rows in every lookup table
pub const LUT_SIZE: usize = 256;

/// Upper bound on the rows of the transparent band before resampling
const MAX_FILL_ROWS: usize = 1 << 16;

/// Number of rows sampled around the middle when picking the band color
const FILL_WINDOW: usize = 6;

fn default_alpha() -> f64 {
    1.0
}

fn default_transparent() -> bool {
    true
}

/// Thresholds and opacity for a transparent colormap
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColormapSpec {
    pub fmin: f64,
    pub fmid: f64,
    pub fmax: f64,
    /// Pivot of a diverging colormap; `None` for sequential
    #[serde(default)]
    pub center: Option<f64>,
    /// Overall opacity, multiplied into every row
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Fade out values near `fmin` (sequential) or `center` (diverging)
    #[serde(default = "default_transparent")]
    pub transparent: bool,
}

impl ColormapSpec {
    /// Sequential, fully opaque spec with transparency enabled
    pub fn new(fmin: f64, fmid: f64, fmax: f64) -> Self {
        Self {
            fmin,
            fmid,
            fmax,
            center: None,
            alpha: default_alpha(),
            transparent: default_transparent(),
        }
    }

    pub fn with_center(mut self, center: Option<f64>) -> Self {
        self.center = center;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn is_diverging(&self) -> bool {
        self.center.is_some()
    }

    /// Check ordering of the thresholds and the opacity range
    pub fn validate(&self) -> Result<()> {
        // Written so that NaN fails too
        if !(self.fmin <= self.fmid && self.fmid <= self.fmax) {
            return Err(BrainError::InvalidLimits {
                fmin: self.fmin,
                fmid: self.fmid,
                fmax: self.fmax,
            });
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(BrainError::InvalidAlpha(self.alpha));
        }
        if let Some(center) = self.center {
            if !center.is_finite() {
                return Err(BrainError::Config(format!("center must be finite, got {}", center)));
            }
        }
        Ok(())
    }

    /// Data interval spanned by the table, first row to last row
    pub fn scalar_range(&self) -> (f64, f64) {
        match self.center {
            Some(center) => (center - self.fmax, center + self.fmax),
            None => (self.fmin, self.fmax),
        }
    }

    /// Build the 256-row table for `colormap`
    pub fn build(&self, colormap: &Colormap) -> Result<ColorLut> {
        self.validate()?;
        let diverging = self.is_diverging();

        let mut table = base_table(colormap);
        if self.transparent {
            for (row, factor) in table.iter_mut().zip(transparency_factors(diverging)) {
                row[3] = row[3] * factor / 255.0;
            }
        }
        for row in &mut table {
            row[3] *= self.alpha;
        }

        let half = LUT_SIZE / 2;
        let (fmin, fmid, fmax) = (self.fmin, self.fmid, self.fmax);
        let table = match self.center {
            None => scale_sequential(&table, fmin, fmid, fmax),
            Some(_) if fmax == fmin => {
                let band = &table[half - FILL_WINDOW / 2..half + FILL_WINDOW / 2];
                let mut out = Vec::with_capacity(LUT_SIZE);
                out.push(table[0]);
                out.extend(fill_colors(band, LUT_SIZE - 2));
                out.push(table[LUT_SIZE - 1]);
                out
            }
            Some(center) => {
                let (lo, mid, hi) = (center - fmax, center - fmid, center - fmin);
                let lower = scale_sequential(&table[..half], lo, mid, hi);
                let flipped: Vec<Rgba> = table[half..].iter().rev().copied().collect();
                let mut upper = scale_sequential(&flipped, lo, mid, hi);
                upper.reverse();

                let band = &table[half - FILL_WINDOW / 2..half + FILL_WINDOW / 2];
                let fill = fill_rows(fmin, fmax, half);
                let mut out = Vec::with_capacity(lower.len() + fill + upper.len());
                out.extend(lower);
                out.extend(fill_colors(band, fill));
                out.extend(upper);
                out
            }
        };

        let table = if table.len() == LUT_SIZE {
            table
        } else {
            resample(&table, LUT_SIZE)
        };
        log::debug!(
            "Built {} LUT for fmin={} fmid={} fmax={} center={:?} alpha={}",
            colormap.name(),
            fmin,
            fmid,
            fmax,
            self.center,
            self.alpha
        );
        Ok(ColorLut {
            rows: table.into_iter().map(|row| row.map(|v| v / 255.0)).collect(),
        })
    }
}

/// Build a transparent lookup table.
///
/// Shorthand for `ColormapSpec::new(fmin, fmid, fmax)` with the given
/// `center` and `alpha`, built against `colormap`.
pub fn calculate_lut(
    colormap: &Colormap,
    alpha: f64,
    fmin: f64,
    fmid: f64,
    fmax: f64,
    center: Option<f64>,
) -> Result<ColorLut> {
    ColormapSpec::new(fmin, fmid, fmax)
        .with_center(center)
        .with_alpha(alpha)
        .build(colormap)
}

/// A 256-row RGBA lookup table, channels in `[0, 1]`
#[derive(Clone, Debug, PartialEq)]
pub struct ColorLut {
    rows: Vec<Rgba>,
}

impl ColorLut {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Rgba] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rgba> {
        self.rows.iter()
    }

    pub fn first(&self) -> Rgba {
        self.rows[0]
    }

    pub fn last(&self) -> Rgba {
        self.rows[self.rows.len() - 1]
    }

    /// Rows as 8-bit RGBA, the form renderers upload as a color table
    pub fn to_bytes(&self) -> Vec<[u8; 4]> {
        (0..self.rows.len()).map(|idx| self.to_bytes_row(idx)).collect()
    }

    pub fn to_color32(&self) -> Vec<Color32> {
        self.rows.iter().map(|&row| to_color32(row)).collect()
    }

    /// Render the table as a horizontal colorbar, low values on the left
    pub fn to_color_image(&self, width: usize, height: usize) -> ColorImage {
        let mut rgba = Vec::with_capacity(width * height * 4);
        let denom = width.saturating_sub(1).max(1) as f64;
        let columns: Vec<[u8; 4]> = (0..width)
            .map(|x| {
                let idx = ((x as f64 / denom) * (LUT_SIZE - 1) as f64).round() as usize;
                self.to_bytes_row(idx.min(LUT_SIZE - 1))
            })
            .collect();
        for _ in 0..height {
            for column in &columns {
                rgba.extend_from_slice(column);
            }
        }
        ColorImage::from_rgba_unmultiplied([width, height], &rgba)
    }

    /// Row index for a data value over the data interval `[lo, hi]`.
    ///
    /// Values outside the interval clamp to the first or last row; NaN maps
    /// to the first row.
    pub fn index_for(&self, value: f64, lo: f64, hi: f64) -> usize {
        let last = self.rows.len() - 1;
        if value.is_nan() {
            return 0;
        }
        if hi <= lo {
            return if value >= hi { last } else { 0 };
        }
        let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
        ((t * last as f64).round() as usize).min(last)
    }

    /// Color of a data value over `[lo, hi]`, see [`ColorLut::index_for`]
    pub fn lookup(&self, value: f64, lo: f64, hi: f64) -> Rgba {
        self.rows[self.index_for(value, lo, hi)]
    }

    fn to_bytes_row(&self, idx: usize) -> [u8; 4] {
        self.rows[idx].map(|v| (v * 255.0).round_ties_even().clamp(0.0, 255.0) as u8)
    }
}

impl Index<usize> for ColorLut {
    type Output = Rgba;

    fn index(&self, idx: usize) -> &Rgba {
        &self.rows[idx]
    }
}

/// Evenly spaced samples, last one pinned to `stop`
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut out: Vec<f64> = (0..num).map(|i| i as f64 * step + start).collect();
            out[num - 1] = stop;
            out
        }
    }
}

/// Base colormap sampled on 256 points and scaled to 0..=255
fn base_table(colormap: &Colormap) -> Vec<Rgba> {
    linspace(0.0, 1.0, LUT_SIZE)
        .into_iter()
        .map(|t| colormap.map(t).map(|v| (v * 255.0).round_ties_even()))
        .collect()
}

/// Per-row opacity in 0..=255.
///
/// Sequential tables ramp up over the lower half. Diverging tables are opaque
/// in the outer quarters and dip to zero at the middle.
fn transparency_factors(diverging: bool) -> Vec<f64> {
    let ramp = |n: usize| -> Vec<f64> {
        linspace(0.0, 255.0, n)
            .into_iter()
            .map(f64::round_ties_even)
            .collect()
    };
    let mut factors = Vec::with_capacity(LUT_SIZE);
    if diverging {
        let quarter = LUT_SIZE / 4;
        factors.extend(std::iter::repeat(255.0).take(quarter));
        factors.extend(ramp(quarter).into_iter().rev());
        factors.extend(ramp(quarter));
        factors.extend(std::iter::repeat(255.0).take(LUT_SIZE - 3 * quarter));
    } else {
        let half = LUT_SIZE / 2;
        factors.extend(ramp(half));
        factors.extend(std::iter::repeat(255.0).take(LUT_SIZE - half));
    }
    factors
}

/// Linear interpolation at a fractional row index, clamped to the table
fn sample_row(table: &[Rgba], x: f64) -> Rgba {
    let last = table.len() - 1;
    let x = x.clamp(0.0, last as f64);
    let i = (x.floor() as usize).min(last);
    if i == last {
        return table[last];
    }
    let frac = x - i as f64;
    let (lo, hi) = (table[i], table[i + 1]);
    std::array::from_fn(|c| lo[c] + (hi[c] - lo[c]) * frac)
}

/// Stretch a table so that `mid` lands on its middle row.
///
/// Rows up to the split cover the lower half of the input and the rest cover
/// the upper half, each resampled to its new length.
fn scale_sequential(table: &[Rgba], lo: f64, mid: f64, hi: f64) -> Vec<Rgba> {
    let n = table.len();
    let half = n / 2;
    let mid_idx = if hi == lo {
        0
    } else {
        let raw = (n as f64 * ((mid - lo) / (hi - lo))).round_ties_even() as i64 - 1;
        raw.clamp(0, n as i64 - 2) as usize
    };
    let n_left = mid_idx + 1;
    let n_right = n - n_left;

    let mut out = Vec::with_capacity(n);
    out.extend(
        linspace(0.0, (half - 1) as f64, n_left)
            .into_iter()
            .map(|x| sample_row(table, x)),
    );
    out.extend(
        linspace((n - 1) as f64, half as f64, n_right)
            .into_iter()
            .rev()
            .map(|x| sample_row(table, x)),
    );
    out
}

/// Rows of the transparent band between the two halves of a diverging table
fn fill_rows(fmin: f64, fmax: f64, half: usize) -> usize {
    let rows = (fmin * half as f64 / (fmax - fmin)).round_ties_even();
    // negative fmin collapses the band; as-casts saturate at zero
    let rows = (rows as usize).saturating_mul(2);
    if rows > MAX_FILL_ROWS {
        log::warn!(
            "Transparent band of {} rows (fmin={}, fmax={}) capped at {}",
            rows,
            fmin,
            fmax,
            MAX_FILL_ROWS
        );
        MAX_FILL_ROWS
    } else {
        rows
    }
}

/// Colors for the band around the center of a diverging table.
///
/// When the rows around the middle contain a sharp jump (a colormap with a
/// hard center), the band is split between the two colors at the jump.
/// Otherwise it uses the middle row.
fn fill_colors(window: &[Rgba], count: usize) -> Vec<Rgba> {
    let steps: Vec<f64> = window
        .windows(2)
        .map(|pair| {
            (0..3)
                .map(|c| (pair[1][c] - pair[0][c]).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    let outer = (steps[0] + steps[steps.len() - 1]) / 2.0 * 3.0;
    let jump = steps[1..steps.len() - 1]
        .iter()
        .position(|&step| step > outer)
        .map(|p| p + 1);

    match jump {
        Some(idx) => {
            let first = count / 2;
            let mut out = vec![window[idx]; first];
            out.extend(std::iter::repeat(window[idx + 1]).take(count - first));
            out
        }
        None => vec![window[window.len() / 2]; count],
    }
}

/// Resample to `n` rows spread evenly over the 1-based row positions
fn resample(table: &[Rgba], n: usize) -> Vec<Rgba> {
    linspace(1.0, table.len() as f64, n)
        .into_iter()
        .map(|x| sample_row(table, x - 1.0))
        .collect()
}
