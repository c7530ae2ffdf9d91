//! Colormap definitions and utilities
//!
//! Base colormaps map a normalized value in `[0, 1]` to straight (non
//! premultiplied) RGBA in `[0, 1]`. The transparent lookup tables in
//! [`crate::lut`] are built on top of these.

use egui::Color32;

use crate::colormap_luts::{
    COOLWARM_ANCHORS, GRAY_ANCHORS, INFERNO_ANCHORS, MNE_ANCHORS, RDBU_ANCHORS, VIRIDIS_ANCHORS,
};
use crate::error::{BrainError, Result};

/// Straight RGBA, each channel in `[0, 1]`
pub type Rgba = [f64; 4];

const VALID_NAMES: &str = "auto, gray, hot, coolwarm, RdBu, viridis, inferno, mne (append _r to reverse)";

/// Built-in colormap families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColormapKind {
    #[default]
    Hot,
    Gray,
    Viridis,
    Inferno,
    /// Diverging
    Coolwarm,
    /// Diverging
    RdBu,
    /// Diverging, the default for signed data
    Mne,
}

impl ColormapKind {
    /// Name as accepted by [`Colormap::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            ColormapKind::Hot => "hot",
            ColormapKind::Gray => "gray",
            ColormapKind::Viridis => "viridis",
            ColormapKind::Inferno => "inferno",
            ColormapKind::Coolwarm => "coolwarm",
            ColormapKind::RdBu => "RdBu",
            ColormapKind::Mne => "mne",
        }
    }

    /// Check if this is a diverging colormap
    pub fn is_diverging(&self) -> bool {
        matches!(self, ColormapKind::Coolwarm | ColormapKind::RdBu | ColormapKind::Mne)
    }

    /// All built-in colormaps
    pub fn all() -> &'static [ColormapKind] {
        &[
            ColormapKind::Hot,
            ColormapKind::Gray,
            ColormapKind::Viridis,
            ColormapKind::Inferno,
            ColormapKind::Coolwarm,
            ColormapKind::RdBu,
            ColormapKind::Mne,
        ]
    }

    fn map(&self, t: f64) -> Rgba {
        match self {
            ColormapKind::Hot => hot(t),
            ColormapKind::Gray => sample_anchors(&GRAY_ANCHORS, t),
            ColormapKind::Viridis => sample_anchors(&VIRIDIS_ANCHORS, t),
            ColormapKind::Inferno => sample_anchors(&INFERNO_ANCHORS, t),
            ColormapKind::Coolwarm => sample_anchors(&COOLWARM_ANCHORS, t),
            ColormapKind::RdBu => sample_anchors(&RDBU_ANCHORS, t),
            ColormapKind::Mne => sample_anchors(&MNE_ANCHORS, t),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Source {
    Builtin(ColormapKind),
    /// Evenly spaced user colors
    Listed(Vec<Rgba>),
}

/// A base colormap: a built-in family or a listed ramp, optionally reversed
#[derive(Clone, Debug, PartialEq)]
pub struct Colormap {
    source: Source,
    reversed: bool,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::new(ColormapKind::default())
    }
}

impl From<ColormapKind> for Colormap {
    fn from(kind: ColormapKind) -> Self {
        Self::new(kind)
    }
}

impl Colormap {
    pub fn new(kind: ColormapKind) -> Self {
        Self {
            source: Source::Builtin(kind),
            reversed: false,
        }
    }

    /// Build a colormap from evenly spaced RGBA colors.
    ///
    /// A single color yields a constant map.
    pub fn listed(colors: Vec<Rgba>) -> Result<Self> {
        if colors.is_empty() {
            return Err(BrainError::Config("a listed colormap needs at least one color".into()));
        }
        if let Some(bad) = colors
            .iter()
            .find(|c| c.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0))
        {
            return Err(BrainError::Config(format!(
                "listed colormap channels must be in [0, 1], got {:?}",
                bad
            )));
        }
        Ok(Self {
            source: Source::Listed(colors),
            reversed: false,
        })
    }

    /// Look up a colormap by name.
    ///
    /// Matching is case-insensitive and a `_r` suffix reverses the map.
    /// `"auto"` picks `mne` for diverging data and `hot` otherwise.
    pub fn from_name(name: &str, diverging: bool) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let (base, reversed) = match lower.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let kind = match base {
            "auto" if diverging => ColormapKind::Mne,
            "auto" => ColormapKind::Hot,
            _ => ColormapKind::all()
                .iter()
                .copied()
                .find(|k| k.name().eq_ignore_ascii_case(base))
                .ok_or_else(|| BrainError::UnknownColormap {
                    name: name.to_string(),
                    valid: VALID_NAMES.to_string(),
                })?,
        };
        let cmap = Self::new(kind);
        Ok(if reversed { cmap.reversed() } else { cmap })
    }

    /// The same colormap running from 1 to 0
    pub fn reversed(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Display name, `"listed"` for user ramps
    pub fn name(&self) -> String {
        let base = match &self.source {
            Source::Builtin(kind) => kind.name(),
            Source::Listed(_) => "listed",
        };
        if self.reversed {
            format!("{base}_r")
        } else {
            base.to_string()
        }
    }

    /// Built-in family, if any
    pub fn kind(&self) -> Option<ColormapKind> {
        match self.source {
            Source::Builtin(kind) => Some(kind),
            Source::Listed(_) => None,
        }
    }

    /// Map a normalized value (0-1) to a color
    pub fn map(&self, t: f64) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let t = if self.reversed { 1.0 - t } else { t };
        match &self.source {
            Source::Builtin(kind) => kind.map(t),
            Source::Listed(colors) => sample_listed(colors, t),
        }
    }
}

/// Convert straight RGBA in `[0, 1]` to an egui color
pub fn to_color32(rgba: Rgba) -> Color32 {
    let [r, g, b, a] = rgba.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// matplotlib's black-red-yellow-white ramp
fn hot(t: f64) -> Rgba {
    const RED_END: f64 = 0.365079;
    const GREEN_END: f64 = 0.746032;
    let r = 0.0416 + (1.0 - 0.0416) * t / RED_END;
    let g = (t - RED_END) / (GREEN_END - RED_END);
    let b = (t - GREEN_END) / (1.0 - GREEN_END);
    [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 1.0]
}

/// Interpolate between evenly spaced 8-bit anchors
fn sample_anchors(anchors: &[[u8; 3]], t: f64) -> Rgba {
    let (i, frac) = segment(anchors.len(), t);
    let lo = anchors[i];
    let hi = anchors[(i + 1).min(anchors.len() - 1)];
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac) / 255.0;
    [mix(lo[0], hi[0]), mix(lo[1], hi[1]), mix(lo[2], hi[2]), 1.0]
}

fn sample_listed(colors: &[Rgba], t: f64) -> Rgba {
    let (i, frac) = segment(colors.len(), t);
    let lo = colors[i];
    let hi = colors[(i + 1).min(colors.len() - 1)];
    std::array::from_fn(|c| lo[c] + (hi[c] - lo[c]) * frac)
}

/// Segment index and fraction of `t` along `n` evenly spaced anchors
fn segment(n: usize, t: f64) -> (usize, f64) {
    if n < 2 {
        return (0, 0.0);
    }
    let pos = t * (n - 1) as f64;
    let i = (pos.floor() as usize).min(n - 2);
    (i, pos - i as f64)
}
