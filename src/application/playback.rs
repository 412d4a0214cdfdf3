// Playback clock and the interval task that drives it
use crate::infrastructure::config::PlaybackSettings;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Playback position inside the viewed domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackClock {
    time: f64,
    domain: (f64, f64),
    speed: f64,
    playing: bool,
    #[serde(skip)]
    step_seconds: f64,
    #[serde(skip)]
    jump_seconds: f64,
}

impl PlaybackClock {
    pub fn new(settings: &PlaybackSettings, domain: (f64, f64)) -> Self {
        Self {
            time: domain.0,
            domain,
            speed: 1.0,
            playing: false,
            step_seconds: settings.step_seconds,
            jump_seconds: settings.jump_seconds,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Non-positive or non-finite speeds are ignored.
    pub fn set_speed(&mut self, speed: f64) -> bool {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
            true
        } else {
            false
        }
    }

    /// New domain; the time is pulled back inside it.
    pub fn set_domain(&mut self, domain: (f64, f64)) {
        self.domain = domain;
        self.time = self.clamp(self.time);
    }

    /// Back to the domain start, stopped.
    pub fn reset(&mut self, domain: (f64, f64)) {
        self.domain = domain;
        self.time = domain.0;
        self.playing = false;
    }

    pub fn seek(&mut self, time: f64) -> f64 {
        if time.is_finite() {
            self.time = self.clamp(time);
        }
        self.time
    }

    pub fn rewind(&mut self) -> f64 {
        self.seek(self.time - self.jump_seconds)
    }

    pub fn fast_forward(&mut self) -> f64 {
        self.seek(self.time + self.jump_seconds)
    }

    /// One tick forward. Returns false once the domain end is reached, which
    /// also stops the clock.
    pub fn advance(&mut self) -> bool {
        self.time = self.clamp(self.time + self.step_seconds * self.speed);
        if self.time >= self.domain.1 {
            self.playing = false;
        }
        self.playing
    }

    fn clamp(&self, time: f64) -> f64 {
        time.max(self.domain.0).min(self.domain.1)
    }
}

/// Monotonic counter; a ticker acts only while its generation is current.
#[derive(Debug, Clone, Default)]
pub struct GenerationToken(Arc<AtomicU64>);

impl GenerationToken {
    /// Starts a new generation and invalidates every earlier one.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::SeqCst) == generation
    }
}

/// Spawns a task calling `on_tick` every `period` until it returns false or
/// `generation` stops being current.
pub fn spawn_ticker<F>(
    period: Duration,
    token: GenerationToken,
    generation: u64,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(u64) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if !token.is_current(generation) {
                tracing::debug!("Playback generation {} superseded", generation);
                break;
            }
            if !on_tick(generation) {
                break;
            }
        }
    })
}
