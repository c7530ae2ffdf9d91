//! Camera pose and the view codec.
//!
//! This module contains pure camera geometry that can be unit tested without
//! a renderer. A view is described by spherical angles around the focal
//! point:
//!
//! - `azimuth`: angle in the x/y plane from +x, in `[0, 360)`
//! - `elevation`: polar angle from +z, in `[0, 180]`
//! - `roll`: rotation of the view-up about the direction of projection,
//!   relative to the up vector closest to +z, in `(-180, 180]`
//!
//! With `align` set, the angles are measured in the subject frame given by an
//! [`Alignment`] instead of scene coordinates. The focal point and distance
//! are always reported in scene coordinates.

use std::fmt;
use std::str::FromStr;

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{BrainError, Result};

/// Default vertical field of view in degrees, used when fitting bounds
pub const DEFAULT_VIEW_ANGLE: f64 = 30.0;

/// `sin(elevation)` below which the camera counts as looking straight along z
const POLE_EPS: f64 = 1e-9;

/// Smallest usable length for direction and up vectors
const MIN_VECTOR_LENGTH: f64 = 1e-12;

/// Raw camera transform in scene coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub view_up: DVec3,
    /// Horizontal direction of the last azimuth written by [`show_view`].
    ///
    /// Looking straight along z the direction alone has no azimuth, so it is
    /// read from here instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azimuth_axis: Option<DVec3>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(-500.0, 0.0, 0.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Z,
            azimuth_axis: None,
        }
    }
}

impl Camera {
    pub fn new(position: DVec3, focal_point: DVec3, view_up: DVec3) -> Self {
        Self {
            position,
            focal_point,
            view_up,
            azimuth_axis: None,
        }
    }

    /// Distance from the camera to its focal point
    pub fn distance(&self) -> f64 {
        self.position.distance(self.focal_point)
    }

    /// Unit vector from the camera towards the focal point
    pub fn direction_of_projection(&self) -> Option<DVec3> {
        (self.focal_point - self.position).try_normalize()
    }

    /// Roll in scene coordinates
    pub fn roll(&self) -> Result<f64> {
        get_view(self, &Alignment::identity(), false).map(|view| view.roll)
    }

    /// Point the camera at the center of `bounds` from far enough away to fit them.
    ///
    /// The viewing direction and up vector are kept.
    pub fn reset_to_bounds(&mut self, bounds: &Bounds, view_angle: f64) {
        let dir = (self.position - self.focal_point)
            .try_normalize()
            .unwrap_or(DVec3::Z);
        let radius = if bounds.radius() > 0.0 { bounds.radius() } else { 1.0 };
        let half_angle = (view_angle.clamp(1.0, 179.0) / 2.0).to_radians();
        let distance = radius / half_angle.sin();
        self.focal_point = bounds.center();
        self.position = self.focal_point + dir * distance;
        log::debug!("Reset camera to bounds center {:?} at distance {}", self.focal_point, distance);
    }
}

/// Axis-aligned scene bounds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(DVec3::splat(-100.0), DVec3::splat(100.0))
    }
}

impl Bounds {
    /// Bounds spanning two corners, in any order
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// From `[xmin, xmax, ymin, ymax, zmin, zmax]`
    pub fn from_vtk(b: [f64; 6]) -> Self {
        Self::new(DVec3::new(b[0], b[2], b[4]), DVec3::new(b[1], b[3], b[5]))
    }

    /// `[xmin, xmax, ymin, ymax, zmin, zmax]`
    pub fn to_vtk(&self) -> [f64; 6] {
        [self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z]
    }

    /// Tight bounds around `points`, `None` if there are none
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        }))
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the diagonal
    pub fn radius(&self) -> f64 {
        (self.max - self.min).length() * 0.5
    }
}

/// Fixed affine from the subject frame into scene coordinates.
///
/// Only the linear part acts on camera directions; translation would move
/// the focal point, which is always kept in scene coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Alignment {
    affine: DMat4,
    linear: DMat3,
    inverse: DMat3,
}

impl Default for Alignment {
    fn default() -> Self {
        Self::identity()
    }
}

impl Alignment {
    pub fn identity() -> Self {
        Self {
            affine: DMat4::IDENTITY,
            linear: DMat3::IDENTITY,
            inverse: DMat3::IDENTITY,
        }
    }

    pub fn from_affine(affine: DMat4) -> Result<Self> {
        let linear = DMat3::from_mat4(affine);
        let det = linear.determinant();
        if !det.is_finite() || det.abs() < MIN_VECTOR_LENGTH {
            return Err(BrainError::SingularAlignment(det));
        }
        Ok(Self {
            affine,
            linear,
            inverse: linear.inverse(),
        })
    }

    /// From a row-major 4x4 matrix
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Result<Self> {
        Self::from_affine(DMat4::from_cols_array_2d(&rows).transpose())
    }

    /// Row-major 4x4 matrix
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        self.affine.transpose().to_cols_array_2d()
    }

    pub fn affine(&self) -> DMat4 {
        self.affine
    }

    pub fn is_identity(&self) -> bool {
        self.linear == DMat3::IDENTITY
    }

    fn to_subject(&self, v: DVec3) -> DVec3 {
        self.inverse * v
    }

    fn to_scene(&self, v: DVec3) -> DVec3 {
        self.linear * v
    }
}

/// User-facing camera pose; angles in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub roll: f64,
    pub distance: f64,
    pub azimuth: f64,
    pub elevation: f64,
    pub focal_point: DVec3,
}

impl ViewDescriptor {
    /// An update that sets every component of this view
    pub fn to_update(&self) -> ViewUpdate {
        ViewUpdate {
            roll: Some(self.roll),
            distance: Some(self.distance),
            azimuth: Some(self.azimuth),
            elevation: Some(self.elevation),
            focal_point: Some(FocalPoint::Point(self.focal_point)),
        }
    }
}

/// Target focal point for [`show_view`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FocalPointRepr", into = "FocalPointRepr")]
pub enum FocalPoint {
    /// Center of the visible scene bounds at call time
    Auto,
    Point(DVec3),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FocalPointRepr {
    Keyword(String),
    Point([f64; 3]),
}

impl TryFrom<FocalPointRepr> for FocalPoint {
    type Error = String;

    fn try_from(repr: FocalPointRepr) -> std::result::Result<Self, String> {
        match repr {
            FocalPointRepr::Keyword(word) if word == "auto" => Ok(FocalPoint::Auto),
            FocalPointRepr::Keyword(word) => Err(format!(
                "focalpoint must be \"auto\" when a string, got {:?}",
                word
            )),
            FocalPointRepr::Point(p) => Ok(FocalPoint::Point(DVec3::from_array(p))),
        }
    }
}

impl From<FocalPoint> for FocalPointRepr {
    fn from(focal: FocalPoint) -> Self {
        match focal {
            FocalPoint::Auto => FocalPointRepr::Keyword("auto".to_string()),
            FocalPoint::Point(p) => FocalPointRepr::Point(p.to_array()),
        }
    }
}

/// Partial view change; unset components keep their current value
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(alias = "focalpoint", skip_serializing_if = "Option::is_none")]
    pub focal_point: Option<FocalPoint>,
}

impl ViewUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object such as `{"azimuth": 90, "focalpoint": "auto"}`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn roll(mut self, roll: f64) -> Self {
        self.roll = Some(roll);
        self
    }

    pub fn distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn azimuth(mut self, azimuth: f64) -> Self {
        self.azimuth = Some(azimuth);
        self
    }

    pub fn elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn focal_point(mut self, focal_point: FocalPoint) -> Self {
        self.focal_point = Some(focal_point);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject non-finite angles and non-positive distances
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("roll", self.roll),
            ("azimuth", self.azimuth),
            ("elevation", self.elevation),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(BrainError::InvalidView(format!("{} must be finite, got {}", name, v)));
                }
            }
        }
        if let Some(d) = self.distance {
            if !(d.is_finite() && d > 0.0) {
                return Err(BrainError::InvalidView(format!(
                    "distance must be finite and positive, got {}",
                    d
                )));
            }
        }
        if let Some(FocalPoint::Point(p)) = self.focal_point {
            if !p.is_finite() {
                return Err(BrainError::InvalidView(format!("focal point must be finite, got {:?}", p)));
            }
        }
        Ok(())
    }
}

/// Up vector with zero roll for a view direction (closest to +z)
fn reference_up(azimuth: f64, elevation: f64) -> DVec3 {
    let (sin_az, cos_az) = azimuth.sin_cos();
    let (sin_el, cos_el) = elevation.sin_cos();
    DVec3::new(-cos_az * cos_el, -sin_az * cos_el, sin_el)
}

/// Unit vector from focal point to camera, and the view-up, for angles in degrees
fn view_vectors(azimuth: f64, elevation: f64, roll: f64) -> (DVec3, DVec3) {
    let (az, el) = (azimuth.to_radians(), elevation.to_radians());
    let (sin_az, cos_az) = az.sin_cos();
    let (sin_el, cos_el) = el.sin_cos();
    let dir = DVec3::new(cos_az * sin_el, sin_az * sin_el, cos_el);
    let reference = reference_up(az, el);
    let projection = -dir;
    let (sin_roll, cos_roll) = roll.to_radians().sin_cos();
    let up = reference * cos_roll + projection.cross(reference) * sin_roll;
    (dir, up)
}

fn normalize_azimuth(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

fn normalize_roll(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Read the view of `camera`.
///
/// With `align`, angles are measured in the subject frame of `alignment`.
/// When the camera looks straight along z the azimuth is the one last written
/// by [`show_view`], or the one the view-up implies for zero roll if there is
/// none. Roll is always the signed angle from the reference up to the view-up.
pub fn get_view(camera: &Camera, alignment: &Alignment, align: bool) -> Result<ViewDescriptor> {
    let offset = camera.position - camera.focal_point;
    let distance = offset.length();
    if !(distance.is_finite() && distance > MIN_VECTOR_LENGTH) {
        return Err(BrainError::DegenerateCamera(format!(
            "camera position {:?} coincides with focal point",
            camera.position
        )));
    }
    let to_frame = |v: DVec3| if align { alignment.to_subject(v) } else { v };
    let dir = to_frame(offset).normalize();
    let up = to_frame(camera.view_up);
    let up = (up - dir * up.dot(dir))
        .try_normalize()
        .ok_or_else(|| BrainError::DegenerateCamera("view-up is parallel to the view direction".into()))?;

    let horizontal = dir.x.hypot(dir.y);
    let elevation = horizontal.atan2(dir.z);
    let azimuth = if horizontal < POLE_EPS {
        let stored = camera
            .azimuth_axis
            .map(to_frame)
            .filter(|a| a.x.hypot(a.y) > MIN_VECTOR_LENGTH);
        match stored {
            Some(axis) => axis.y.atan2(axis.x),
            None if dir.z > 0.0 => (-up.y).atan2(-up.x),
            None => up.y.atan2(up.x),
        }
    } else {
        dir.y.atan2(dir.x)
    };
    let reference = reference_up(azimuth, elevation);
    let projection = -dir;
    let roll = reference.cross(up).dot(projection).atan2(reference.dot(up));

    Ok(ViewDescriptor {
        roll: normalize_roll(roll.to_degrees()),
        distance,
        azimuth: normalize_azimuth(azimuth.to_degrees()),
        elevation: elevation.to_degrees(),
        focal_point: camera.focal_point,
    })
}

/// Apply `update` to `camera` and return the resulting view.
///
/// Unset components are read from the camera first (in the same frame), so a
/// partial update leaves everything else where it was. `FocalPoint::Auto`
/// resolves to the center of `bounds`.
pub fn show_view(
    camera: &mut Camera,
    alignment: &Alignment,
    update: &ViewUpdate,
    align: bool,
    bounds: &Bounds,
) -> Result<ViewDescriptor> {
    update.validate()?;
    let current = get_view(camera, alignment, align).ok();
    let keep = |given: Option<f64>, read: fn(&ViewDescriptor) -> f64| -> Result<f64> {
        match (given, &current) {
            (Some(value), _) => Ok(value),
            (None, Some(view)) => Ok(read(view)),
            (None, None) => Err(BrainError::DegenerateCamera(
                "cannot keep unset view parameters of a degenerate camera".into(),
            )),
        }
    };
    let roll = keep(update.roll, |v| v.roll)?;
    let distance = keep(update.distance, |v| v.distance)?;
    let azimuth = keep(update.azimuth, |v| v.azimuth)?;
    let elevation = keep(update.elevation, |v| v.elevation)?;
    let focal_point = match update.focal_point {
        Some(FocalPoint::Auto) => bounds.center(),
        Some(FocalPoint::Point(p)) => p,
        None => camera.focal_point,
    };

    let (dir, up) = view_vectors(azimuth, elevation, roll);
    let (sin_az, cos_az) = azimuth.to_radians().sin_cos();
    let axis = DVec3::new(cos_az, sin_az, 0.0);
    let to_scene = |v: DVec3| if align { alignment.to_scene(v) } else { v };
    camera.focal_point = focal_point;
    camera.position = focal_point + to_scene(dir).normalize() * distance;
    camera.view_up = to_scene(up).normalize();
    camera.azimuth_axis = Some(to_scene(axis));
    log::debug!(
        "show_view roll={} distance={} azimuth={} elevation={} focal={:?} align={}",
        roll,
        distance,
        azimuth,
        elevation,
        focal_point,
        align
    );
    get_view(camera, alignment, align)
}

/// Axis for incremental camera rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationAxis {
    Azimuth,
    Elevation,
}

/// Rotate the camera about its focal point by `degrees` along one angle
pub fn rotate_view(
    camera: &mut Camera,
    alignment: &Alignment,
    axis: RotationAxis,
    degrees: f64,
    align: bool,
    bounds: &Bounds,
) -> Result<ViewDescriptor> {
    let current = get_view(camera, alignment, align)?;
    let update = match axis {
        RotationAxis::Azimuth => ViewUpdate::new().azimuth(current.azimuth + degrees),
        RotationAxis::Elevation => ViewUpdate::new().elevation(current.elevation + degrees),
    };
    show_view(camera, alignment, &update, align, bounds)
}

/// Hemisphere(s) shown by a viewer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    #[default]
    Lh,
    Rh,
    Both,
    Split,
}

impl Hemisphere {
    pub fn name(&self) -> &'static str {
        match self {
            Hemisphere::Lh => "lh",
            Hemisphere::Rh => "rh",
            Hemisphere::Both => "both",
            Hemisphere::Split => "split",
        }
    }

    /// Single hemispheres covered
    pub fn hemis(&self) -> &'static [Hemisphere] {
        match self {
            Hemisphere::Lh => &[Hemisphere::Lh],
            Hemisphere::Rh => &[Hemisphere::Rh],
            Hemisphere::Both | Hemisphere::Split => &[Hemisphere::Lh, Hemisphere::Rh],
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hemisphere {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lh" => Ok(Hemisphere::Lh),
            "rh" => Ok(Hemisphere::Rh),
            "both" => Ok(Hemisphere::Both),
            "split" => Ok(Hemisphere::Split),
            _ => Err(BrainError::UnknownHemisphere(s.to_string())),
        }
    }
}

/// (name, azimuth, elevation) for the left hemisphere
const LH_VIEWS: &[(&str, f64, f64)] = &[
    ("lateral", 180.0, 90.0),
    ("medial", 0.0, 90.0),
    ("rostral", 90.0, 90.0),
    ("caudal", 270.0, 90.0),
    ("dorsal", 270.0, 0.0),
    ("ventral", 90.0, 180.0),
    ("frontal", 120.0, 80.0),
    ("parietal", 260.0, 60.0),
    ("axial", 270.0, 0.0),
    ("sagittal", 180.0, 90.0),
    ("coronal", 90.0, 90.0),
];

/// (name, azimuth, elevation) for the right hemisphere
const RH_VIEWS: &[(&str, f64, f64)] = &[
    ("lateral", 0.0, 90.0),
    ("medial", 180.0, 90.0),
    ("rostral", 90.0, 90.0),
    ("caudal", 270.0, 90.0),
    ("dorsal", 270.0, 0.0),
    ("ventral", 90.0, 180.0),
    ("frontal", 60.0, 80.0),
    ("parietal", 280.0, 60.0),
    ("axial", 270.0, 0.0),
    ("sagittal", 0.0, 90.0),
    ("coronal", 90.0, 90.0),
];

/// Names accepted by [`view_angles`]
pub fn view_names() -> impl Iterator<Item = &'static str> {
    LH_VIEWS.iter().map(|(name, _, _)| *name)
}

/// `(azimuth, elevation)` of a named view.
///
/// Names may be abbreviated to their first three letters. `both` and `split`
/// use the left hemisphere's table.
pub fn view_angles(hemi: Hemisphere, name: &str) -> Result<(f64, f64)> {
    let table = match hemi {
        Hemisphere::Rh => RH_VIEWS,
        _ => LH_VIEWS,
    };
    let wanted = name.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(view, _, _)| *view == wanted || view[..3] == wanted)
        .map(|&(_, azimuth, elevation)| (azimuth, elevation))
        .ok_or_else(|| BrainError::UnknownView {
            name: name.to_string(),
            valid: view_names().collect::<Vec<_>>().join(", "),
        })
}
