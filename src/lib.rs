//! cortexview - Headless scene state for cortical surface viewers
//!
//! This library holds everything a brain surface viewer needs apart from the
//! renderer itself: transparent colormap lookup tables for statistical
//! overlays, a codec between raw camera transforms and azimuth/elevation/roll
//! views, and the events linked viewers exchange. It can be used natively or
//! embedded in web applications through WebAssembly.
//!
//! ## Architecture
//!
//! - `ColormapSpec` / `ColorLut`: 256-row RGBA tables built from a base colormap
//! - `view`: camera pose <-> `ViewDescriptor`, named views, alignment transforms
//! - `Brain`: owns camera, colormap, time axis and picks; publishes `UiEvent`s
//! - `BrainHandle`: WASM interface for JavaScript to drive a `Brain`

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

mod brain;
pub mod colormap;
mod colormap_luts;
pub mod config;
pub mod error;
pub mod events;
pub mod lut;
pub mod view;

pub use brain::{Brain, AUTO_PERCENTILES};
pub use colormap::{Colormap, ColormapKind, Rgba};
pub use config::BrainOptions;
pub use error::{BrainError, Result};
pub use events::{EventBus, EventKind, SubscriptionId, UiEvent, SOURCE_POWER_KIND};
pub use lut::{calculate_lut, ColorLut, ColormapSpec, LUT_SIZE};
pub use view::{
    get_view, show_view, view_angles, Alignment, Bounds, Camera, FocalPoint, Hemisphere, RotationAxis,
    ViewDescriptor, ViewUpdate,
};

/// Callbacks that can be registered from JavaScript
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct BrainCallbacks {
    /// Called with every event the brain publishes, as a plain object
    pub on_event: Option<js_sys::Function>,
}

/// A handle to one brain viewer's state.
///
/// This struct is exposed to JavaScript. Events published while a method runs
/// are queued and handed to the registered callback after the brain is
/// released, so callbacks may call back into the handle.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct BrainHandle {
    brain: RefCell<Brain>,
    callbacks: RefCell<BrainCallbacks>,
    pending: Rc<RefCell<Vec<UiEvent>>>,
}

#[cfg(target_arch = "wasm32")]
fn init_logging() {
    #[cfg(debug_assertions)]
    {
        eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    }
    #[cfg(not(debug_assertions))]
    {
        eframe::WebLogger::init(log::LevelFilter::Warn).ok();
    }
}

/// Bad arguments become a `RangeError`, everything else a plain `Error`
#[cfg(target_arch = "wasm32")]
fn to_js_error(err: BrainError) -> JsValue {
    let message = err.to_string();
    if err.is_usage_error() {
        js_sys::RangeError::new(&message).into()
    } else {
        js_sys::Error::new(&message).into()
    }
}

#[cfg(target_arch = "wasm32")]
fn to_js_value<T: serde::Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&json)
}

#[cfg(target_arch = "wasm32")]
fn lut_to_array(lut: &ColorLut) -> js_sys::Uint8Array {
    let bytes: Vec<u8> = lut.to_bytes().into_iter().flatten().collect();
    js_sys::Uint8Array::from(&bytes[..])
}

#[cfg(target_arch = "wasm32")]
impl BrainHandle {
    /// Run `f` on the brain, then deliver any events it published
    fn with_brain<T>(&self, f: impl FnOnce(&mut Brain) -> Result<T>) -> std::result::Result<T, JsValue> {
        let result = f(&mut self.brain.borrow_mut());
        self.flush_events();
        result.map_err(to_js_error)
    }

    fn flush_events(&self) {
        let events: Vec<UiEvent> = self.pending.borrow_mut().drain(..).collect();
        let Some(callback) = self.callbacks.borrow().on_event.clone() else {
            return;
        };
        for event in events {
            match to_js_value(&event) {
                Ok(value) => {
                    if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                        log::warn!("Event callback failed: {:?}", err);
                    }
                }
                Err(err) => log::warn!("Could not convert event {:?}: {:?}", event, err),
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl BrainHandle {
    /// Create a new brain from a JSON options object (empty string for defaults).
    #[wasm_bindgen]
    pub fn create(options_json: &str) -> std::result::Result<BrainHandle, JsValue> {
        init_logging();

        let options = if options_json.trim().is_empty() {
            BrainOptions::default()
        } else {
            BrainOptions::from_json_str(options_json).map_err(to_js_error)?
        };
        let mut brain = Brain::new(options).map_err(to_js_error)?;

        let pending = Rc::new(RefCell::new(Vec::new()));
        let sink = pending.clone();
        brain.subscribe_all(Box::new(move |event: &UiEvent| sink.borrow_mut().push(event.clone())));

        Ok(BrainHandle {
            brain: RefCell::new(brain),
            callbacks: RefCell::new(BrainCallbacks::default()),
            pending,
        })
    }

    // =========================================================================
    // Camera
    // =========================================================================

    /// Get the current view as `{roll, distance, azimuth, elevation, focal_point}`
    #[wasm_bindgen(js_name = getView)]
    pub fn get_view(&self, align: bool) -> std::result::Result<JsValue, JsValue> {
        let view = self.brain.borrow().get_view(align).map_err(to_js_error)?;
        to_js_value(&view)
    }

    /// Apply a partial view given as JSON, e.g. `{"azimuth": 90, "focalpoint": "auto"}`.
    /// Returns the resulting view.
    #[wasm_bindgen(js_name = showView)]
    pub fn show_view(&self, update_json: &str, align: bool) -> std::result::Result<JsValue, JsValue> {
        let update = ViewUpdate::from_json(update_json).map_err(to_js_error)?;
        let view = self.with_brain(|brain| brain.show_view(&update, align))?;
        to_js_value(&view)
    }

    /// Show a named view ("lateral", "medial", ... or 3-letter abbreviations)
    #[wasm_bindgen(js_name = showNamedView)]
    pub fn show_named_view(&self, name: &str) -> std::result::Result<JsValue, JsValue> {
        let view = self.with_brain(|brain| brain.show_named_view(name, None))?;
        to_js_value(&view)
    }

    /// Rotate about the focal point; `axis` is "azimuth" or "elevation"
    #[wasm_bindgen(js_name = rotate)]
    pub fn rotate(&self, axis: &str, degrees: f64) -> std::result::Result<(), JsValue> {
        let axis = match axis {
            "azimuth" => RotationAxis::Azimuth,
            "elevation" => RotationAxis::Elevation,
            _ => {
                return Err(JsValue::from_str(&format!(
                    "Unknown rotation axis {:?}, expected azimuth or elevation",
                    axis
                )))
            }
        };
        self.with_brain(|brain| brain.rotate_camera(axis, degrees).map(|_| ()))
    }

    /// Fit the camera to the scene bounds and show the initial view
    #[wasm_bindgen(js_name = reset)]
    pub fn reset(&self) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.reset().map(|_| ()))
    }

    /// Set visible scene bounds as [xmin, xmax, ymin, ymax, zmin, zmax]
    #[wasm_bindgen(js_name = setBounds)]
    pub fn set_bounds(&self, bounds: &[f64]) -> std::result::Result<(), JsValue> {
        let bounds: [f64; 6] = bounds
            .try_into()
            .map_err(|_| JsValue::from_str("bounds must have 6 values"))?;
        self.brain.borrow_mut().set_bounds(Bounds::from_vtk(bounds));
        Ok(())
    }

    // =========================================================================
    // Colormap
    // =========================================================================

    /// Update any of fmin/fmid/fmax/alpha (pass undefined to keep a value)
    #[wasm_bindgen(js_name = updateLut)]
    pub fn update_lut(
        &self,
        fmin: Option<f64>,
        fmid: Option<f64>,
        fmax: Option<f64>,
        alpha: Option<f64>,
    ) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.update_lut(fmin, fmid, fmax, alpha))
    }

    /// Scale all limits by a positive factor
    #[wasm_bindgen(js_name = updateFscale)]
    pub fn update_fscale(&self, factor: f64) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.update_fscale(factor))
    }

    #[wasm_bindgen(js_name = setColormap)]
    pub fn set_colormap(&self, name: &str) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.set_colormap(name))
    }

    #[wasm_bindgen(js_name = getColormap)]
    pub fn get_colormap(&self) -> String {
        self.brain.borrow().colormap().name()
    }

    /// Get [fmin, fmid, fmax]
    #[wasm_bindgen(js_name = getLimits)]
    pub fn get_limits(&self) -> js_sys::Float64Array {
        let (fmin, fmid, fmax) = self.brain.borrow().limits();
        let result = js_sys::Float64Array::new_with_length(3);
        result.copy_from(&[fmin, fmid, fmax]);
        result
    }

    /// Get the lookup table as 256 RGBA rows of bytes (1024 values)
    #[wasm_bindgen(js_name = getLut)]
    pub fn get_lut(&self) -> js_sys::Uint8Array {
        lut_to_array(self.brain.borrow().lut())
    }

    /// Store overlay values for auto scaling
    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&self, values: &[f64]) {
        self.brain.borrow_mut().set_data(values.to_vec());
    }

    #[wasm_bindgen(js_name = applyAutoScaling)]
    pub fn apply_auto_scaling(&self) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.apply_auto_scaling())
    }

    #[wasm_bindgen(js_name = restoreUserScaling)]
    pub fn restore_user_scaling(&self) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.restore_user_scaling())
    }

    // =========================================================================
    // Time and picking
    // =========================================================================

    #[wasm_bindgen(js_name = setTimes)]
    pub fn set_times(&self, times: Vec<f64>) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.set_times(times))
    }

    /// Go to the sample nearest `time`
    #[wasm_bindgen(js_name = setTime)]
    pub fn set_time(&self, time: f64) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.set_time(time))
    }

    #[wasm_bindgen(js_name = setTimePoint)]
    pub fn set_time_point(&self, index: usize) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.set_time_point(index))
    }

    #[wasm_bindgen(js_name = getTime)]
    pub fn get_time(&self) -> Option<f64> {
        self.brain.borrow().current_time()
    }

    // =========================================================================
    // Playback
    // =========================================================================

    #[wasm_bindgen(js_name = setPlaybackSpeed)]
    pub fn set_playback_speed(&self, speed: f64) -> std::result::Result<(), JsValue> {
        self.with_brain(|brain| brain.set_playback_speed(speed))
    }

    /// Start, stop or flip playback; returns whether it is now on
    #[wasm_bindgen(js_name = togglePlayback)]
    pub fn toggle_playback(&self, value: Option<bool>) -> std::result::Result<bool, JsValue> {
        self.with_brain(|brain| brain.toggle_playback(value))
    }

    /// Call once per animation frame with the elapsed wall time in seconds
    #[wasm_bindgen(js_name = advancePlayback)]
    pub fn advance_playback(&self, dt: f64) -> std::result::Result<bool, JsValue> {
        self.with_brain(|brain| brain.advance_playback(dt))
    }

    /// Toggle a vertex pick; returns whether it is now picked
    #[wasm_bindgen(js_name = selectVertex)]
    pub fn select_vertex(&self, hemi: &str, vertex: usize) -> std::result::Result<bool, JsValue> {
        let hemi: Hemisphere = hemi.parse().map_err(to_js_error)?;
        self.with_brain(|brain| brain.select_vertex(hemi, vertex))
    }

    // =========================================================================
    // Event linking
    // =========================================================================

    /// Apply an event object received from another viewer without republishing it
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(&self, event_json: &str) -> std::result::Result<(), JsValue> {
        let event: UiEvent = serde_json::from_str(event_json).map_err(|e| to_js_error(e.into()))?;
        self.with_brain(|brain| brain.handle_event(&event))
    }

    /// Register a callback receiving `{type, ...}` objects for every event
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: js_sys::Function) {
        self.callbacks.borrow_mut().on_event = Some(callback);
    }

    /// Clear all registered callbacks.
    #[wasm_bindgen(js_name = clearCallbacks)]
    pub fn clear_callbacks(&self) {
        self.callbacks.borrow_mut().on_event = None;
    }
}

/// Build a lookup table without a viewer; returns 256 RGBA rows of bytes.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = calculateLut)]
pub fn calculate_lut_js(
    colormap: &str,
    alpha: f64,
    fmin: f64,
    fmid: f64,
    fmax: f64,
    center: Option<f64>,
) -> std::result::Result<js_sys::Uint8Array, JsValue> {
    let cmap = Colormap::from_name(colormap, center.is_some()).map_err(to_js_error)?;
    let lut = calculate_lut(&cmap, alpha, fmin, fmid, fmax, center).map_err(to_js_error)?;
    Ok(lut_to_array(&lut))
}
