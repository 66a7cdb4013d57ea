//! Synthetic controller samples.
//!
//! The producer has no real input device; it animates the analog axes and
//! triggers with phase-shifted sine waves, or fills them with random values.

use std::f64::consts::PI;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One controller state snapshot, serialized as JSON on the wire.
///
/// Field names are fixed by the consumer side and must not change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    #[serde(rename = "N")]
    pub north: u8,
    #[serde(rename = "E")]
    pub east: u8,
    #[serde(rename = "S")]
    pub south: u8,
    #[serde(rename = "W")]
    pub west: u8,
    #[serde(rename = "LB")]
    pub left_bumper: u8,
    #[serde(rename = "RB")]
    pub right_bumper: u8,
    #[serde(rename = "LS")]
    pub left_stick: u8,
    #[serde(rename = "RS")]
    pub right_stick: u8,
    #[serde(rename = "SELECT")]
    pub select: u8,
    #[serde(rename = "START")]
    pub start: u8,

    #[serde(rename = "LjoyX")]
    pub left_x: u8,
    #[serde(rename = "LjoyY")]
    pub left_y: u8,
    #[serde(rename = "RjoyX")]
    pub right_x: u8,
    #[serde(rename = "RjoyY")]
    pub right_y: u8,
    #[serde(rename = "LT")]
    pub left_trigger: u8,
    #[serde(rename = "RT")]
    pub right_trigger: u8,
    #[serde(rename = "dX")]
    pub dpad_x: i8,
    #[serde(rename = "dY")]
    pub dpad_y: i8,

    /// Unix time in milliseconds when the sample was taken.
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

/// How the analog values are generated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SampleMode {
    /// Smooth sine waves, one period per second.
    #[default]
    Wave,
    /// Independent random values per sample.
    Random,
}

/// Map a point on a one-second sine period to 0..=255, centered on 127.
pub fn wave(t: f64, phase: f64) -> u8 {
    let s = 0.5 + 0.5 * (2.0 * PI * (t + phase)).sin();
    (s * 255.0) as u8
}

/// Produces controller samples relative to a fixed start instant.
pub struct SampleSource {
    mode: SampleMode,
    start: Instant,
}

impl SampleSource {
    pub fn new(mode: SampleMode) -> Self {
        Self {
            mode,
            start: Instant::now(),
        }
    }

    /// Sample the controller now.
    pub fn next_sample(&self) -> ControllerState {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.sample_at(elapsed, unix_millis())
    }

    /// Sample the controller at `elapsed` seconds since start.
    pub fn sample_at(&self, elapsed: f64, timestamp: i64) -> ControllerState {
        let [left_x, left_y, right_x, right_y, left_trigger, right_trigger] = match self.mode {
            SampleMode::Wave => [
                wave(elapsed, 0.0),
                wave(elapsed, 0.25),
                wave(elapsed, 0.5),
                wave(elapsed, 0.75),
                wave(elapsed, 0.1),
                wave(elapsed, 0.6),
            ],
            SampleMode::Random => rand::random::<[u8; 6]>(),
        };

        ControllerState {
            left_x,
            left_y,
            right_x,
            right_y,
            left_trigger,
            right_trigger,
            timestamp,
            ..ControllerState::default()
        }
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
