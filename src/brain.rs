//! Scene state of a single brain viewer.
//!
//! `Brain` owns the camera, the overlay colormap and its lookup table, the
//! time axis and the picked vertices. Every change made through the public
//! API is published on the viewer's [`EventBus`]; changes that arrive from a
//! linked viewer through [`Brain::handle_event`] are applied silently so
//! linked viewers do not echo each other.

use crate::colormap::Colormap;
use crate::config::{check_playback_speed, BrainOptions};
use crate::error::{BrainError, Result};
use crate::events::{EventBus, EventCallback, EventKind, SubscriptionId, UiEvent, SOURCE_POWER_KIND};
use crate::lut::{ColorLut, ColormapSpec};
use crate::view::{
    get_view, rotate_view, show_view, view_angles, Alignment, Bounds, Camera, FocalPoint, Hemisphere,
    RotationAxis, ViewDescriptor, ViewUpdate,
};

/// Percentiles of the data used for `(fmin, fmid, fmax)` by auto scaling
pub const AUTO_PERCENTILES: [f64; 3] = [96.0, 97.5, 99.95];

/// Largest distance at which a linked time counts as one of our samples
const TIME_MATCH_TOLERANCE: f64 = 1e-6;

#[derive(Debug)]
pub struct Brain {
    hemi: Hemisphere,
    colormap: Colormap,
    spec: ColormapSpec,
    /// Limits last set by the user, restored after auto scaling
    user_limits: (f64, f64, f64),
    lut: ColorLut,
    camera: Camera,
    alignment: Alignment,
    bounds: Bounds,
    view_angle: f64,
    initial_view: String,
    data: Vec<f64>,
    times: Vec<f64>,
    time_idx: usize,
    /// Unsnapped time reached by playback
    playback_time: f64,
    playback_speed: f64,
    playing: bool,
    picked: Vec<(Hemisphere, usize)>,
    events: EventBus,
}

impl Brain {
    /// Create a viewer and show the first configured view
    pub fn new(options: BrainOptions) -> Result<Self> {
        options.validate()?;
        let spec = options.colormap_spec();
        let colormap = Colormap::from_name(&options.colormap, spec.is_diverging())?;
        let lut = spec.build(&colormap)?;
        let initial_view = options
            .views
            .first()
            .cloned()
            .ok_or_else(|| BrainError::Config("at least one view is required".into()))?;
        for view in &options.views {
            view_angles(options.hemi, view)?;
        }

        let mut brain = Self {
            hemi: options.hemi,
            colormap,
            spec,
            user_limits: (spec.fmin, spec.fmid, spec.fmax),
            lut,
            camera: Camera::default(),
            alignment: options.alignment()?,
            bounds: options.bounds(),
            view_angle: options.view_angle,
            initial_view,
            data: Vec::new(),
            times: Vec::new(),
            time_idx: 0,
            playback_time: 0.0,
            playback_speed: options.playback_speed,
            playing: false,
            picked: Vec::new(),
            events: EventBus::new(),
        };
        brain.set_times(options.times)?;
        brain.apply_reset()?;
        log::debug!("Created {} brain with colormap {}", brain.hemi, brain.colormap.name());
        Ok(brain)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn subscribe(&mut self, kind: EventKind, callback: EventCallback) -> SubscriptionId {
        self.events.subscribe(kind, callback)
    }

    pub fn subscribe_all(&mut self, callback: EventCallback) -> SubscriptionId {
        self.events.subscribe_all(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Apply a change published by a linked viewer without republishing it.
    ///
    /// Vertex selections for hemispheres this viewer does not show are ignored,
    /// as are colormap ranges of another kind.
    pub fn handle_event(&mut self, event: &UiEvent) -> Result<()> {
        match *event {
            UiEvent::TimeChange { time } => {
                if self.times.is_empty() {
                    log::warn!("Ignoring time change to {} without a time axis", time);
                } else {
                    self.apply_time(time)?;
                    if let Some(reason) = sample_mismatch(&self.times, time) {
                        log::warn!(
                            "Linked time {} {} this viewer's time axis, using {}",
                            time,
                            reason,
                            self.times[self.time_idx]
                        );
                    }
                }
            }
            UiEvent::ColormapRange {
                ref kind,
                fmin,
                fmid,
                fmax,
                alpha,
            } => {
                if kind != SOURCE_POWER_KIND {
                    log::warn!("Ignoring colormap range of unknown kind {:?}", kind);
                    return Ok(());
                }
                let spec = ColormapSpec {
                    fmin,
                    fmid,
                    fmax,
                    alpha,
                    ..self.spec
                };
                self.apply_spec(spec)?;
                self.user_limits = (fmin, fmid, fmax);
            }
            UiEvent::VertexSelect { hemi, vertex } => {
                if self.hemi.hemis().contains(&hemi) {
                    self.toggle_vertex(hemi, vertex);
                } else {
                    log::warn!("Ignoring vertex {} on hemisphere {} not shown here", vertex, hemi);
                }
            }
            UiEvent::CameraMove { view } => {
                show_view(&mut self.camera, &self.alignment, &view.to_update(), false, &self.bounds)?;
            }
            UiEvent::PlaybackSpeed { speed } => {
                check_playback_speed(speed)?;
                self.playback_speed = speed;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Colormap
    // =========================================================================

    pub fn hemi(&self) -> Hemisphere {
        self.hemi
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    pub fn colormap_spec(&self) -> &ColormapSpec {
        &self.spec
    }

    /// Current `(fmin, fmid, fmax)`
    pub fn limits(&self) -> (f64, f64, f64) {
        (self.spec.fmin, self.spec.fmid, self.spec.fmax)
    }

    pub fn lut(&self) -> &ColorLut {
        &self.lut
    }

    /// Data interval covered by the lookup table
    pub fn scalar_range(&self) -> (f64, f64) {
        self.spec.scalar_range()
    }

    /// Horizontal colorbar of the current lookup table
    pub fn colorbar_image(&self, width: usize, height: usize) -> egui::ColorImage {
        self.lut.to_color_image(width, height)
    }

    /// Switch the base colormap by name, keeping the limits
    pub fn set_colormap(&mut self, name: &str) -> Result<()> {
        let colormap = Colormap::from_name(name, self.spec.is_diverging())?;
        let lut = self.spec.build(&colormap)?;
        self.colormap = colormap;
        self.lut = lut;
        log::debug!("Colormap set to {}", self.colormap.name());
        self.publish_range();
        Ok(())
    }

    /// Change any of the thresholds or the opacity.
    ///
    /// Limits stay ordered: setting `fmin` raises `fmid` and `fmax` if they
    /// are below it, setting `fmid` moves `fmin` down and `fmax` up as
    /// needed, and setting `fmax` lowers `fmin` and `fmid`. The updates are
    /// applied in that order.
    pub fn update_lut(
        &mut self,
        fmin: Option<f64>,
        fmid: Option<f64>,
        fmax: Option<f64>,
        alpha: Option<f64>,
    ) -> Result<()> {
        if [fmin, fmid, fmax].into_iter().flatten().any(|v| !v.is_finite()) {
            return Err(BrainError::InvalidLimits {
                fmin: fmin.unwrap_or(self.spec.fmin),
                fmid: fmid.unwrap_or(self.spec.fmid),
                fmax: fmax.unwrap_or(self.spec.fmax),
            });
        }
        let mut spec = self.spec;
        if let Some(v) = fmin {
            spec.fmin = v;
            spec.fmid = spec.fmid.max(v);
            spec.fmax = spec.fmax.max(v);
        }
        if let Some(v) = fmid {
            spec.fmid = v;
            spec.fmin = spec.fmin.min(v);
            spec.fmax = spec.fmax.max(v);
        }
        if let Some(v) = fmax {
            spec.fmax = v;
            spec.fmin = spec.fmin.min(v);
            spec.fmid = spec.fmid.min(v);
        }
        if let Some(alpha) = alpha {
            spec.alpha = alpha;
        }
        self.apply_spec(spec)?;
        self.user_limits = self.limits();
        self.publish_range();
        Ok(())
    }

    /// Multiply all three limits by `factor`
    pub fn update_fscale(&mut self, factor: f64) -> Result<()> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(BrainError::Config(format!(
                "scale factor must be finite and positive, got {}",
                factor
            )));
        }
        let spec = ColormapSpec {
            fmin: self.spec.fmin * factor,
            fmid: self.spec.fmid * factor,
            fmax: self.spec.fmax * factor,
            ..self.spec
        };
        self.apply_spec(spec)?;
        self.user_limits = self.limits();
        self.publish_range();
        Ok(())
    }

    /// Store overlay values used by auto scaling
    pub fn set_data(&mut self, values: Vec<f64>) {
        self.data = values;
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Set the limits from percentiles of the data.
    ///
    /// Diverging maps use absolute values. Without finite data the limits are
    /// left unchanged.
    pub fn apply_auto_scaling(&mut self) -> Result<()> {
        let diverging = self.spec.is_diverging();
        let mut values: Vec<f64> = self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| if diverging { v.abs() } else { v })
            .collect();
        if values.is_empty() {
            log::warn!("No finite data to auto scale from");
            return Ok(());
        }
        values.sort_by(f64::total_cmp);
        let [fmin, fmid, fmax] = AUTO_PERCENTILES.map(|p| percentile(&values, p));
        let spec = ColormapSpec {
            fmin,
            fmid,
            fmax,
            ..self.spec
        };
        self.apply_spec(spec)?;
        self.publish_range();
        Ok(())
    }

    /// Return to the limits last set explicitly
    pub fn restore_user_scaling(&mut self) -> Result<()> {
        let (fmin, fmid, fmax) = self.user_limits;
        let spec = ColormapSpec {
            fmin,
            fmid,
            fmax,
            ..self.spec
        };
        self.apply_spec(spec)?;
        self.publish_range();
        Ok(())
    }

    fn apply_spec(&mut self, spec: ColormapSpec) -> Result<()> {
        self.lut = spec.build(&self.colormap)?;
        self.spec = spec;
        log::debug!(
            "LUT limits fmin={} fmid={} fmax={} alpha={}",
            spec.fmin,
            spec.fmid,
            spec.fmax,
            spec.alpha
        );
        Ok(())
    }

    fn publish_range(&mut self) {
        let event = UiEvent::ColormapRange {
            kind: SOURCE_POWER_KIND.to_string(),
            fmin: self.spec.fmin,
            fmid: self.spec.fmid,
            fmax: self.spec.fmax,
            alpha: self.spec.alpha,
        };
        self.events.publish(&event);
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Replace the time axis and go to its first sample
    pub fn set_times(&mut self, times: Vec<f64>) -> Result<()> {
        if times.iter().any(|t| !t.is_finite()) {
            return Err(BrainError::Config("times must be finite".into()));
        }
        self.times = times;
        self.time_idx = 0;
        self.playback_time = self.times.first().copied().unwrap_or(0.0);
        if self.times.is_empty() {
            self.playing = false;
        }
        Ok(())
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn time_index(&self) -> usize {
        self.time_idx
    }

    /// Current time, `None` without a time axis
    pub fn current_time(&self) -> Option<f64> {
        self.times.get(self.time_idx).copied()
    }

    pub fn set_time_point(&mut self, index: usize) -> Result<()> {
        if index >= self.times.len() {
            return Err(BrainError::TimeIndex {
                index,
                len: self.times.len(),
            });
        }
        self.time_idx = index;
        self.playback_time = self.times[index];
        self.publish_time();
        Ok(())
    }

    /// Go to the sample nearest `time`, clamped to the time axis
    pub fn set_time(&mut self, time: f64) -> Result<()> {
        self.apply_time(time)?;
        self.publish_time();
        Ok(())
    }

    fn apply_time(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(BrainError::Config(format!("time must be finite, got {}", time)));
        }
        if self.times.is_empty() {
            return Err(BrainError::TimeIndex { index: 0, len: 0 });
        }
        self.time_idx = nearest_index(&self.times, time);
        self.playback_time = self.times[self.time_idx];
        Ok(())
    }

    fn publish_time(&mut self) {
        if let Some(time) = self.current_time() {
            self.events.publish(&UiEvent::TimeChange { time });
        }
    }

    // =========================================================================
    // Playback
    // =========================================================================

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Seconds of data shown per second of playback
    pub fn set_playback_speed(&mut self, speed: f64) -> Result<()> {
        check_playback_speed(speed)?;
        self.playback_speed = speed;
        log::debug!("Playback speed set to {}", speed);
        self.events.publish(&UiEvent::PlaybackSpeed { speed });
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start or stop playback, flipping the current state when `value` is `None`.
    ///
    /// Starting at the last sample goes back to the first one. Without a time
    /// axis playback stays off. Returns whether playback is now on.
    pub fn toggle_playback(&mut self, value: Option<bool>) -> Result<bool> {
        let play = value.unwrap_or(!self.playing);
        if play && self.times.is_empty() {
            log::warn!("Cannot start playback without a time axis");
            self.playing = false;
            return Ok(false);
        }
        if play && self.playback_time >= max_time(&self.times) {
            self.set_time_point(0)?;
        }
        self.playing = play;
        log::debug!("Playback {}", if play { "started" } else { "stopped" });
        Ok(play)
    }

    /// Move playback on by `dt` seconds of wall time.
    ///
    /// The shown sample is the one nearest the playback time, and
    /// `TimeChange` is published when it changes. Playback stops at the end
    /// of the time axis. Returns whether playback is still on.
    pub fn advance_playback(&mut self, dt: f64) -> Result<bool> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(BrainError::Config(format!(
                "playback step must be finite and non-negative, got {}",
                dt
            )));
        }
        if !self.playing || self.times.is_empty() {
            return Ok(false);
        }
        let end = max_time(&self.times);
        let time = (self.playback_time + dt * self.playback_speed).min(end);
        let idx = nearest_index(&self.times, time);
        self.playback_time = time;
        if idx != self.time_idx {
            self.time_idx = idx;
            self.publish_time();
        }
        if time >= end {
            self.playing = false;
            log::debug!("Playback reached the end at {}", end);
        }
        Ok(self.playing)
    }

    // =========================================================================
    // Vertex picking
    // =========================================================================

    /// Toggle `vertex` in the picked set; returns whether it is now picked
    pub fn select_vertex(&mut self, hemi: Hemisphere, vertex: usize) -> Result<bool> {
        if !matches!(hemi, Hemisphere::Lh | Hemisphere::Rh) || !self.hemi.hemis().contains(&hemi) {
            return Err(BrainError::UnknownHemisphere(hemi.to_string()));
        }
        let picked = self.toggle_vertex(hemi, vertex);
        self.events.publish(&UiEvent::VertexSelect { hemi, vertex });
        Ok(picked)
    }

    pub fn picked_vertices(&self) -> &[(Hemisphere, usize)] {
        &self.picked
    }

    pub fn clear_picked(&mut self) {
        self.picked.clear();
    }

    fn toggle_vertex(&mut self, hemi: Hemisphere, vertex: usize) -> bool {
        match self.picked.iter().position(|&p| p == (hemi, vertex)) {
            Some(pos) => {
                self.picked.remove(pos);
                false
            }
            None => {
                self.picked.push((hemi, vertex));
                true
            }
        }
    }

    // =========================================================================
    // Camera
    // =========================================================================

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Update the visible scene bounds used by `FocalPoint::Auto` and [`Brain::reset`]
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn get_view(&self, align: bool) -> Result<ViewDescriptor> {
        get_view(&self.camera, &self.alignment, align)
    }

    pub fn show_view(&mut self, update: &ViewUpdate, align: bool) -> Result<ViewDescriptor> {
        let view = show_view(&mut self.camera, &self.alignment, update, align, &self.bounds)?;
        self.publish_camera()?;
        Ok(view)
    }

    /// Show a named view such as `"lateral"` for `hemi` (this viewer's when `None`).
    ///
    /// Angles are in the aligned frame and roll is reset.
    pub fn show_named_view(&mut self, name: &str, hemi: Option<Hemisphere>) -> Result<ViewDescriptor> {
        let update = self.named_view_update(name, hemi.unwrap_or(self.hemi))?;
        self.show_view(&update, true)
    }

    pub fn rotate_camera(&mut self, axis: RotationAxis, degrees: f64) -> Result<ViewDescriptor> {
        if !degrees.is_finite() {
            return Err(BrainError::InvalidView(format!("rotation must be finite, got {}", degrees)));
        }
        let view = rotate_view(&mut self.camera, &self.alignment, axis, degrees, true, &self.bounds)?;
        self.publish_camera()?;
        Ok(view)
    }

    /// Refit the camera to the scene bounds and show the first configured view
    pub fn reset(&mut self) -> Result<ViewDescriptor> {
        let view = self.apply_reset()?;
        self.publish_camera()?;
        Ok(view)
    }

    fn apply_reset(&mut self) -> Result<ViewDescriptor> {
        self.camera.reset_to_bounds(&self.bounds, self.view_angle);
        let update = self
            .named_view_update(&self.initial_view, self.hemi)?
            .focal_point(FocalPoint::Auto);
        show_view(&mut self.camera, &self.alignment, &update, true, &self.bounds)
    }

    fn named_view_update(&self, name: &str, hemi: Hemisphere) -> Result<ViewUpdate> {
        let (azimuth, elevation) = view_angles(hemi, name)?;
        Ok(ViewUpdate::new().azimuth(azimuth).elevation(elevation).roll(0.0))
    }

    /// Camera moves are published in scene coordinates
    fn publish_camera(&mut self) -> Result<()> {
        let view = get_view(&self.camera, &self.alignment, false)?;
        self.events.publish(&UiEvent::CameraMove { view });
        Ok(())
    }
}

/// Linear-interpolation percentile of sorted, non-empty values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn max_time(times: &[f64]) -> f64 {
    times.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// How `t` misses the samples in `times`, `None` when one is within tolerance
fn sample_mismatch(times: &[f64], t: f64) -> Option<&'static str> {
    let lo = times.iter().copied().fold(f64::INFINITY, f64::min);
    if t < lo - TIME_MATCH_TOLERANCE || t > max_time(times) + TIME_MATCH_TOLERANCE {
        Some("is outside")
    } else if times.iter().all(|&s| (s - t).abs() > TIME_MATCH_TOLERANCE) {
        Some("falls between samples of")
    } else {
        None
    }
}

/// Index of the sample closest to `t`; earlier sample on ties
fn nearest_index(times: &[f64], t: f64) -> usize {
    times
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_dist), (idx, &sample)| {
            let dist = (sample - t).abs();
            if dist < best_dist {
                (idx, dist)
            } else {
                (best, best_dist)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn brain(options: BrainOptions) -> Brain {
        Brain::new(options).unwrap()
    }

    fn record(brain: &mut Brain) -> Rc<RefCell<Vec<UiEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        brain.subscribe_all(Box::new(move |e: &UiEvent| sink.borrow_mut().push(e.clone())));
        seen
    }

    fn assert_limits(brain: &Brain, want: (f64, f64, f64)) {
        let got = brain.limits();
        for (g, w) in [(got.0, want.0), (got.1, want.1), (got.2, want.2)] {
            assert!((g - w).abs() < 1e-12, "limits {:?} vs {:?}", got, want);
        }
    }

    #[test]
    fn test_new_shows_first_view() {
        for (hemi, azimuth) in [(Hemisphere::Lh, 180.0), (Hemisphere::Rh, 0.0)] {
            let brain = brain(BrainOptions {
                hemi,
                ..Default::default()
            });
            let view = brain.get_view(true).unwrap();
            assert!((view.azimuth - azimuth).abs() < 1e-6, "{} azimuth {}", hemi, view.azimuth);
            assert!((view.elevation - 90.0).abs() < 1e-6);
            assert!(view.roll.abs() < 1e-6);
            assert!(view.focal_point.length() < 1e-9);
            assert_eq!(brain.lut().len(), 256);
        }
    }

    #[test]
    fn test_new_rejects_bad_views_and_colormaps() {
        let err = Brain::new(BrainOptions {
            views: vec!["sideways".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BrainError::UnknownView { .. }));

        let err = Brain::new(BrainOptions {
            colormap: "rainbow".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BrainError::UnknownColormap { .. }));
    }

    #[test]
    fn test_update_lut_keeps_limits_monotonic() {
        let mut brain = brain(BrainOptions {
            fmin: Some(0.1),
            fmid: Some(0.2),
            fmax: Some(0.3),
            ..Default::default()
        });
        brain.update_lut(Some(12.0), None, None, None).unwrap();
        assert_limits(&brain, (12.0, 12.0, 12.0));
        brain.update_lut(None, None, Some(4.0), None).unwrap();
        assert_limits(&brain, (4.0, 4.0, 4.0));
        brain.update_lut(None, Some(6.0), None, None).unwrap();
        assert_limits(&brain, (4.0, 6.0, 6.0));
        brain.update_lut(None, Some(4.0), None, None).unwrap();
        assert_limits(&brain, (4.0, 4.0, 6.0));
        brain.update_lut(Some(12.0), Some(4.0), None, None).unwrap();
        assert_limits(&brain, (4.0, 4.0, 12.0));
    }

    #[test]
    fn test_update_lut_rejects_bad_values_atomically() {
        let mut brain = brain(BrainOptions::default());
        let lut = brain.lut().clone();
        assert!(brain.update_lut(Some(f64::NAN), None, None, None).is_err());
        assert!(matches!(
            brain.update_lut(None, None, None, Some(2.0)),
            Err(BrainError::InvalidAlpha(_))
        ));
        assert_limits(&brain, (0.0, 0.5, 1.0));
        assert_eq!(brain.lut(), &lut);
    }

    #[test]
    fn test_update_lut_publishes_range() {
        let mut brain = brain(BrainOptions::default());
        let seen = record(&mut brain);
        brain.update_lut(None, None, Some(3.0), Some(0.5)).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![UiEvent::ColormapRange {
                kind: SOURCE_POWER_KIND.to_string(),
                fmin: 0.0,
                fmid: 0.5,
                fmax: 3.0,
                alpha: 0.5
            }]
        );
        assert!((brain.lut().last()[3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_colormap_range_of_unknown_kind_is_ignored() {
        let mut brain = brain(BrainOptions::default());
        let lut = brain.lut().clone();
        let event = UiEvent::ColormapRange {
            kind: "unknown_kind".into(),
            fmin: 10.0,
            fmid: 11.0,
            fmax: 12.0,
            alpha: 1.0,
        };
        brain.handle_event(&event).unwrap();
        assert_limits(&brain, (0.0, 0.5, 1.0));
        assert_eq!(brain.lut(), &lut);

        let event = UiEvent::ColormapRange {
            kind: SOURCE_POWER_KIND.into(),
            fmin: 1.0,
            fmid: 2.0,
            fmax: 3.0,
            alpha: 1.0,
        };
        brain.handle_event(&event).unwrap();
        assert_limits(&brain, (1.0, 2.0, 3.0));
        assert_ne!(brain.lut(), &lut);
    }

    #[test]
    fn test_fscale() {
        let mut brain = brain(BrainOptions::default());
        brain.update_fscale(2.0).unwrap();
        assert_limits(&brain, (0.0, 1.0, 2.0));
        assert!(brain.update_fscale(0.0).is_err());
        assert!(brain.update_fscale(f64::NAN).is_err());
    }

    #[test]
    fn test_auto_scaling_and_restore() {
        let mut brain = brain(BrainOptions {
            fmin: Some(1.0),
            fmid: Some(2.0),
            fmax: Some(3.0),
            ..Default::default()
        });
        brain.set_data((0..=100).map(f64::from).collect());
        brain.apply_auto_scaling().unwrap();
        assert_limits(&brain, (96.0, 97.5, 99.95));
        brain.restore_user_scaling().unwrap();
        assert_limits(&brain, (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_auto_scaling_uses_abs_for_diverging() {
        let mut brain = brain(BrainOptions {
            center: Some(0.0),
            ..Default::default()
        });
        assert_eq!(brain.colormap().name(), "mne");
        brain.set_data((0..=100).map(|v| -f64::from(v)).collect());
        brain.apply_auto_scaling().unwrap();
        assert_limits(&brain, (96.0, 97.5, 99.95));
        let (lo, hi) = brain.scalar_range();
        assert!((lo + 99.95).abs() < 1e-9 && (hi - 99.95).abs() < 1e-9);
    }

    #[test]
    fn test_auto_scaling_without_data_is_noop() {
        let mut brain = brain(BrainOptions::default());
        brain.set_data(vec![f64::NAN]);
        brain.apply_auto_scaling().unwrap();
        assert_limits(&brain, (0.0, 0.5, 1.0));
    }

    #[test]
    fn test_time_navigation() {
        let mut brain = brain(BrainOptions {
            times: vec![0.0, 0.1, 0.2, 0.3],
            ..Default::default()
        });
        let seen = record(&mut brain);
        assert_eq!(brain.current_time(), Some(0.0));

        brain.set_time_point(2).unwrap();
        assert_eq!(brain.current_time(), Some(0.2));
        assert!(matches!(
            brain.set_time_point(4),
            Err(BrainError::TimeIndex { index: 4, len: 4 })
        ));

        brain.set_time(0.12).unwrap();
        assert_eq!(brain.time_index(), 1);
        brain.set_time(5.0).unwrap();
        assert_eq!(brain.time_index(), 3);
        brain.set_time(-5.0).unwrap();
        assert_eq!(brain.time_index(), 0);

        let times: Vec<f64> = seen
            .borrow()
            .iter()
            .filter_map(|e| match e {
                UiEvent::TimeChange { time } => Some(*time),
                _ => None,
            })
            .collect();
        assert_eq!(times, vec![0.2, 0.1, 0.3, 0.0]);
    }

    #[test]
    fn test_time_without_axis() {
        let mut brain = brain(BrainOptions::default());
        assert_eq!(brain.current_time(), None);
        assert!(brain.set_time(1.0).is_err());
        assert!(brain.set_time_point(0).is_err());
    }

    #[test]
    fn test_sample_mismatch() {
        let times = [0.0, 0.5, 1.0];
        assert_eq!(sample_mismatch(&times, 0.5), None);
        assert_eq!(sample_mismatch(&times, 1.0 + 1e-9), None);
        assert_eq!(sample_mismatch(&times, 0.25), Some("falls between samples of"));
        assert_eq!(sample_mismatch(&times, 1.5), Some("is outside"));
        assert_eq!(sample_mismatch(&times, -0.1), Some("is outside"));
    }

    #[test]
    fn test_playback_speed_is_published_and_linked() {
        let mut source = brain(BrainOptions::default());
        let mut target = brain(BrainOptions::default());
        let seen = record(&mut source);
        assert_eq!(source.playback_speed(), 0.01);

        source.set_playback_speed(0.1).unwrap();
        assert_eq!(*seen.borrow(), vec![UiEvent::PlaybackSpeed { speed: 0.1 }]);
        assert!(matches!(source.set_playback_speed(0.0), Err(BrainError::Config(_))));
        assert!(source.set_playback_speed(f64::NAN).is_err());
        assert_eq!(source.playback_speed(), 0.1);

        let echoed = record(&mut target);
        for event in seen.borrow().iter() {
            target.handle_event(event).unwrap();
        }
        assert_eq!(target.playback_speed(), 0.1);
        assert!(echoed.borrow().is_empty());
        assert!(target.handle_event(&UiEvent::PlaybackSpeed { speed: -1.0 }).is_err());
    }

    #[test]
    fn test_playback_advances_and_stops_at_end() {
        let mut brain = brain(BrainOptions {
            times: vec![0.0, 0.1, 0.2, 0.3],
            playback_speed: 0.1,
            ..Default::default()
        });
        let seen = record(&mut brain);
        assert!(!brain.advance_playback(1.0).unwrap());
        assert_eq!(brain.time_index(), 0);

        assert!(brain.toggle_playback(None).unwrap());
        // Half a sample interval does not change the shown sample
        assert!(brain.advance_playback(0.4).unwrap());
        assert_eq!(brain.time_index(), 0);
        assert!(brain.advance_playback(0.7).unwrap());
        assert_eq!(brain.time_index(), 1);
        assert!(!brain.advance_playback(10.0).unwrap());
        assert_eq!(brain.time_index(), 3);
        assert!(!brain.is_playing());
        assert!(brain.advance_playback(-1.0).is_err());

        let times: Vec<f64> = seen
            .borrow()
            .iter()
            .filter_map(|e| match e {
                UiEvent::TimeChange { time } => Some(*time),
                _ => None,
            })
            .collect();
        assert_eq!(times, vec![0.1, 0.3]);

        // Starting again from the end rewinds to the first sample
        assert!(brain.toggle_playback(Some(true)).unwrap());
        assert_eq!(brain.time_index(), 0);
        assert!(!brain.toggle_playback(None).unwrap());
        assert!(!brain.is_playing());
    }

    #[test]
    fn test_playback_follows_manual_time_changes() {
        let mut brain = brain(BrainOptions {
            times: vec![0.0, 1.0, 2.0],
            playback_speed: 1.0,
            ..Default::default()
        });
        brain.toggle_playback(Some(true)).unwrap();
        brain.set_time_point(1).unwrap();
        brain.advance_playback(1.0).unwrap();
        assert_eq!(brain.current_time(), Some(2.0));
        assert!(!brain.is_playing());
    }

    #[test]
    fn test_playback_needs_time_axis() {
        let mut brain = brain(BrainOptions::default());
        assert!(!brain.toggle_playback(None).unwrap());
        assert!(!brain.is_playing());

        let mut brain = self::brain(BrainOptions {
            times: vec![0.0, 1.0],
            ..Default::default()
        });
        assert!(brain.toggle_playback(None).unwrap());
        brain.set_times(Vec::new()).unwrap();
        assert!(!brain.is_playing());
        assert!(!brain.advance_playback(1.0).unwrap());
    }

    #[test]
    fn test_select_vertex_toggles() {
        let mut brain = brain(BrainOptions {
            hemi: Hemisphere::Both,
            ..Default::default()
        });
        let seen = record(&mut brain);
        assert!(brain.select_vertex(Hemisphere::Rh, 10).unwrap());
        assert!(brain.select_vertex(Hemisphere::Lh, 3).unwrap());
        assert!(!brain.select_vertex(Hemisphere::Rh, 10).unwrap());
        assert_eq!(brain.picked_vertices(), &[(Hemisphere::Lh, 3)]);
        assert_eq!(seen.borrow().len(), 3);
        assert!(brain.select_vertex(Hemisphere::Both, 1).is_err());

        let mut left = self::brain(BrainOptions::default());
        assert!(left.select_vertex(Hemisphere::Rh, 1).is_err());
    }

    #[test]
    fn test_named_view_and_rotation_publish_camera() {
        let mut brain = brain(BrainOptions::default());
        let seen = record(&mut brain);
        let view = brain.show_named_view("med", None).unwrap();
        assert!(view.azimuth.abs() < 1e-6 || (view.azimuth - 360.0).abs() < 1e-6);
        let view = brain.show_named_view("lateral", Some(Hemisphere::Rh)).unwrap();
        assert!(view.azimuth.abs() < 1e-6 || (view.azimuth - 360.0).abs() < 1e-6);
        let view = brain.rotate_camera(RotationAxis::Elevation, -30.0).unwrap();
        assert!((view.elevation - 60.0).abs() < 1e-6);
        assert_eq!(seen.borrow().len(), 3);
        assert!(seen
            .borrow()
            .iter()
            .all(|e| matches!(e, UiEvent::CameraMove { .. })));
        assert!(brain.show_named_view("nope", None).is_err());
    }

    #[test]
    fn test_reset_returns_to_initial_view() {
        let mut brain = brain(BrainOptions {
            views: vec!["dorsal".into(), "lateral".into()],
            ..Default::default()
        });
        let initial = *brain.camera();
        brain
            .show_view(&ViewUpdate::new().azimuth(33.0).distance(10.0), false)
            .unwrap();
        brain.reset().unwrap();
        assert!(brain.camera().position.distance(initial.position) < 1e-9);
        assert!(brain.camera().view_up.distance(initial.view_up) < 1e-9);
        assert!((brain.get_view(true).unwrap().elevation).abs() < 1e-6);
    }

    #[test]
    fn test_roll_on_dorsal_view_keeps_azimuth() {
        let mut brain = brain(BrainOptions {
            views: vec!["dorsal".into()],
            ..Default::default()
        });
        let before = brain.get_view(true).unwrap();
        assert!(before.elevation.abs() < 1e-6);
        let view = brain.show_view(&ViewUpdate::new().roll(45.0), true).unwrap();
        assert!((view.azimuth - before.azimuth).abs() < 1e-6, "azimuth {}", view.azimuth);
        assert!((view.roll - 45.0).abs() < 1e-6, "roll {}", view.roll);
        assert!((brain.get_view(true).unwrap().roll - 45.0).abs() < 1e-6);

        let mut ventral = self::brain(BrainOptions {
            views: vec!["ventral".into()],
            ..Default::default()
        });
        let before = ventral.get_view(true).unwrap();
        assert!((before.elevation - 180.0).abs() < 1e-6);
        let view = ventral.show_view(&ViewUpdate::new().roll(45.0), true).unwrap();
        assert!((view.azimuth - before.azimuth).abs() < 1e-6, "azimuth {}", view.azimuth);
        assert!((view.roll - 45.0).abs() < 1e-6, "roll {}", view.roll);
    }

    #[test]
    fn test_linked_viewers_do_not_echo() {
        let mut source = brain(BrainOptions {
            times: vec![0.0, 1.0, 2.0],
            ..Default::default()
        });
        let mut target = brain(BrainOptions {
            times: vec![0.0, 0.5, 1.0, 1.5, 2.0],
            ..Default::default()
        });
        let forwarded = record(&mut source);
        let echoed = record(&mut target);

        source.set_time_point(2).unwrap();
        source.update_lut(None, Some(0.7), None, None).unwrap();
        source.select_vertex(Hemisphere::Lh, 5).unwrap();
        source.show_view(&ViewUpdate::new().azimuth(45.0), false).unwrap();

        for event in forwarded.borrow().iter() {
            target.handle_event(event).unwrap();
        }
        assert!(echoed.borrow().is_empty());
        assert_eq!(target.current_time(), Some(2.0));
        assert_limits(&target, source.limits());
        assert_eq!(target.picked_vertices(), source.picked_vertices());
        let (a, b) = (source.get_view(false).unwrap(), target.get_view(false).unwrap());
        assert!((a.azimuth - b.azimuth).abs() < 1e-6);
        assert!((a.distance - b.distance).abs() < 1e-6);
    }

    #[test]
    fn test_set_colormap_keeps_limits() {
        let mut brain = brain(BrainOptions::default());
        brain.set_colormap("viridis_r").unwrap();
        assert_eq!(brain.colormap().name(), "viridis_r");
        assert_limits(&brain, (0.0, 0.5, 1.0));
        assert!(brain.set_colormap("nope").is_err());
        let bar = brain.colorbar_image(64, 4);
        assert_eq!(bar.size, [64, 4]);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
    }

    #[test]
    fn test_nearest_index_prefers_earlier_on_tie() {
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 0.5), 0);
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.6), 2);
    }
}
