//! Viewer configuration loaded from JSON

use serde::{Deserialize, Serialize};

use crate::error::{BrainError, Result};
use crate::lut::ColormapSpec;
use crate::view::{Alignment, Bounds, Hemisphere, DEFAULT_VIEW_ANGLE};

/// Thresholds used when none are configured
pub const DEFAULT_LIMITS: (f64, f64, f64) = (0.0, 0.5, 1.0);

/// Seconds of data advanced per second of playback
pub const DEFAULT_PLAYBACK_SPEED: f64 = 0.01;

/// Options for [`crate::Brain::new`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrainOptions {
    pub hemi: Hemisphere,
    /// Colormap name; `"auto"` picks by whether `center` is set
    pub colormap: String,
    pub alpha: f64,
    pub transparent: bool,
    /// Pivot for a diverging colormap
    pub center: Option<f64>,
    pub fmin: Option<f64>,
    pub fmid: Option<f64>,
    pub fmax: Option<f64>,
    /// Named views; the first one is shown on creation
    pub views: Vec<String>,
    /// Row-major subject-to-scene affine, identity when absent
    pub alignment: Option<[[f64; 4]; 4]>,
    /// Vertical field of view in degrees
    pub view_angle: f64,
    /// `[xmin, xmax, ymin, ymax, zmin, zmax]` of the visible scene
    pub bounds: [f64; 6],
    /// Sample times of the overlay data
    pub times: Vec<f64>,
    pub playback_speed: f64,
}

impl Default for BrainOptions {
    fn default() -> Self {
        Self {
            hemi: Hemisphere::default(),
            colormap: "auto".to_string(),
            alpha: 1.0,
            transparent: true,
            center: None,
            fmin: None,
            fmid: None,
            fmax: None,
            views: vec!["lateral".to_string()],
            alignment: None,
            view_angle: DEFAULT_VIEW_ANGLE,
            bounds: [-100.0, 100.0, -100.0, 100.0, -100.0, 100.0],
            times: Vec::new(),
            playback_speed: DEFAULT_PLAYBACK_SPEED,
        }
    }
}

impl BrainOptions {
    /// Parse and validate options from JSON; absent keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.colormap_spec().validate()?;
        if self.views.is_empty() {
            return Err(BrainError::Config("at least one view is required".into()));
        }
        if !(self.view_angle > 0.0 && self.view_angle < 180.0) {
            return Err(BrainError::Config(format!(
                "view_angle must be in (0, 180) degrees, got {}",
                self.view_angle
            )));
        }
        if self.bounds.iter().any(|v| !v.is_finite()) {
            return Err(BrainError::Config(format!("bounds must be finite, got {:?}", self.bounds)));
        }
        if self.times.iter().any(|t| !t.is_finite()) {
            return Err(BrainError::Config("times must be finite".into()));
        }
        check_playback_speed(self.playback_speed)?;
        self.alignment()?;
        Ok(())
    }

    /// `(fmin, fmid, fmax)` with defaults filled in
    pub fn limits(&self) -> (f64, f64, f64) {
        let (fmin, fmid, fmax) = DEFAULT_LIMITS;
        (
            self.fmin.unwrap_or(fmin),
            self.fmid.unwrap_or(fmid),
            self.fmax.unwrap_or(fmax),
        )
    }

    pub fn colormap_spec(&self) -> ColormapSpec {
        let (fmin, fmid, fmax) = self.limits();
        ColormapSpec::new(fmin, fmid, fmax)
            .with_center(self.center)
            .with_alpha(self.alpha)
            .with_transparent(self.transparent)
    }

    pub fn alignment(&self) -> Result<Alignment> {
        match self.alignment {
            Some(rows) => Alignment::from_rows(rows),
            None => Ok(Alignment::identity()),
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_vtk(self.bounds)
    }
}

pub(crate) fn check_playback_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(BrainError::Config(format!(
            "playback speed must be finite and positive, got {}",
            speed
        )))
    }
}
