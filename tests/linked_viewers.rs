//! Two viewers kept in sync through their event buses, configured from JSON.

use std::cell::RefCell;
use std::rc::Rc;

use cortexview::{Brain, BrainOptions, EventKind, Hemisphere, UiEvent, ViewUpdate};

fn viewer(json: &str) -> Brain {
    Brain::new(BrainOptions::from_json_str(json).unwrap()).unwrap()
}

#[test]
fn events_forwarded_as_json_keep_viewers_in_sync() {
    let mut left = viewer(r#"{"hemi": "lh", "fmin": 1, "fmid": 2, "fmax": 4, "times": [0, 0.01, 0.02]}"#);
    let mut right = viewer(r#"{"hemi": "rh", "views": ["lat"], "times": [0, 0.005, 0.01, 0.015, 0.02]}"#);

    let outbox = Rc::new(RefCell::new(Vec::new()));
    let sink = outbox.clone();
    left.subscribe_all(Box::new(move |event: &UiEvent| {
        sink.borrow_mut().push(serde_json::to_string(event).unwrap())
    }));

    left.set_time(0.011).unwrap();
    left.update_lut(Some(3.0), None, None, None).unwrap();
    left.show_view(&ViewUpdate::new().elevation(45.0), false).unwrap();

    for json in outbox.borrow().iter() {
        let event: UiEvent = serde_json::from_str(json).unwrap();
        right.handle_event(&event).unwrap();
    }

    assert_eq!(outbox.borrow().len(), 3);
    assert_eq!(right.current_time(), Some(0.01));
    assert_eq!(right.limits(), (3.0, 3.0, 4.0));
    let (a, b) = (left.get_view(false).unwrap(), right.get_view(false).unwrap());
    assert!((a.elevation - b.elevation).abs() < 1e-6);
    assert!((a.azimuth - b.azimuth).abs() < 1e-6);
    assert!(a.focal_point.distance(b.focal_point) < 1e-9);
}

#[test]
fn vertex_picks_only_reach_viewers_showing_the_hemisphere() {
    let mut both = viewer(r#"{"hemi": "both"}"#);
    let mut left_only = viewer(r#"{"hemi": "lh"}"#);

    let picks = Rc::new(RefCell::new(Vec::new()));
    let sink = picks.clone();
    both.subscribe(
        EventKind::VertexSelect,
        Box::new(move |event: &UiEvent| sink.borrow_mut().push(event.clone())),
    );

    both.select_vertex(Hemisphere::Lh, 11).unwrap();
    both.select_vertex(Hemisphere::Rh, 12).unwrap();
    for event in picks.borrow().iter() {
        left_only.handle_event(event).unwrap();
    }
    assert_eq!(left_only.picked_vertices(), &[(Hemisphere::Lh, 11)]);
    assert_eq!(both.picked_vertices().len(), 2);
}

#[test]
fn colormap_lut_follows_auto_scaling() {
    let mut brain = viewer(r#"{"colormap": "coolwarm", "center": 0, "fmin": 0.1, "fmid": 0.2, "fmax": 0.3}"#);
    brain.set_data((-500..=500).map(|v| f64::from(v) / 100.0).collect());
    brain.apply_auto_scaling().unwrap();
    let (fmin, fmid, fmax) = brain.limits();
    assert!(fmin < fmid && fmid < fmax && fmax <= 5.0);

    // Values near the center are transparent, extremes are opaque
    let (lo, hi) = brain.scalar_range();
    assert!(brain.lut().lookup(0.0, lo, hi)[3] < 1e-9);
    assert!(brain.lut().lookup(hi, lo, hi)[3] > 0.99);
    assert!(brain.lut().lookup(lo, lo, hi)[3] > 0.99);

    brain.restore_user_scaling().unwrap();
    assert_eq!(brain.limits(), (0.1, 0.2, 0.3));
}

#[test]
fn playback_speed_and_foreign_ranges_over_json() {
    let mut left = viewer(r#"{"times": [0, 1, 2], "playback_speed": 0.5}"#);
    let mut right = viewer(r#"{"times": [0, 1, 2], "fmin": 1, "fmid": 2, "fmax": 3}"#);

    let outbox = Rc::new(RefCell::new(Vec::new()));
    let sink = outbox.clone();
    left.subscribe_all(Box::new(move |event: &UiEvent| {
        sink.borrow_mut().push(serde_json::to_string(event).unwrap())
    }));
    left.set_playback_speed(2.0).unwrap();
    left.toggle_playback(None).unwrap();
    left.advance_playback(0.5).unwrap();

    let foreign = r#"{"type": "colormap_range", "kind": "sensor_power", "fmin": 7, "fmid": 8, "fmax": 9, "alpha": 1}"#;
    outbox.borrow_mut().push(foreign.to_string());
    for json in outbox.borrow().iter() {
        let event: UiEvent = serde_json::from_str(json).unwrap();
        right.handle_event(&event).unwrap();
    }

    assert_eq!(right.playback_speed(), 2.0);
    assert_eq!(right.current_time(), Some(1.0));
    assert_eq!(right.limits(), (1.0, 2.0, 3.0));
    assert!(!right.is_playing());
}
