//! Linked time changes that do not land on one of the receiving viewer's
//! samples are applied to the nearest sample and reported with a warning.

use std::sync::{Mutex, Once};

use cortexview::{Brain, BrainOptions, EventKind, UiEvent};
use log::{Level, LevelFilter, Metadata, Record};

struct WarningLog;

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static LOGGER: WarningLog = WarningLog;
static INIT: Once = Once::new();

impl log::Log for WarningLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            WARNINGS.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn init_logging() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Warn);
    });
}

/// Warnings mentioning `needle`, which keeps tests running in parallel apart
fn warnings_about(needle: &str) -> Vec<String> {
    WARNINGS
        .lock()
        .unwrap()
        .iter()
        .filter(|w| w.contains(needle))
        .cloned()
        .collect()
}

fn viewer(times: Vec<f64>) -> Brain {
    Brain::new(BrainOptions {
        times,
        ..Default::default()
    })
    .unwrap()
}

/// Publish `time` from a leader and hand it to `follower` like a link does
fn link_time(follower: &mut Brain, leader_times: Vec<f64>, time: f64) {
    let mut leader = viewer(leader_times);
    let forwarded = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = forwarded.clone();
    leader.subscribe(
        EventKind::TimeChange,
        Box::new(move |event: &UiEvent| sink.borrow_mut().push(event.clone())),
    );
    leader.set_time(time).unwrap();
    for event in forwarded.borrow().iter() {
        follower.handle_event(event).unwrap();
    }
}

#[test]
fn time_between_samples_warns_and_snaps() {
    init_logging();
    let mut follower = viewer(vec![0.0, 0.25, 0.5, 0.75]);
    link_time(&mut follower, vec![0.0, 0.125, 0.375, 0.625], 0.375);

    assert_eq!(follower.current_time(), Some(0.25));
    let warnings = warnings_about("Linked time 0.375");
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("falls between samples"), "{}", warnings[0]);
    assert!(warnings[0].ends_with("using 0.25"), "{}", warnings[0]);
}

#[test]
fn time_outside_axis_warns_and_clamps() {
    init_logging();
    let mut follower = viewer(vec![0.0, 0.5, 1.0]);
    link_time(&mut follower, vec![0.0, 1.0, 2.5], 2.5);

    assert_eq!(follower.current_time(), Some(1.0));
    let warnings = warnings_about("Linked time 2.5");
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("is outside"), "{}", warnings[0]);
}

#[test]
fn matching_time_does_not_warn() {
    init_logging();
    let mut follower = viewer(vec![0.0, 0.0625, 0.125]);
    link_time(&mut follower, vec![0.0, 0.0625, 0.125, 0.1875], 0.0625);

    assert_eq!(follower.current_time(), Some(0.0625));
    assert!(warnings_about("Linked time 0.0625").is_empty());
}
