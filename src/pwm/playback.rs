//! Real-time playback driver
//!
//! A dedicated thread polls the monotonic clock, maps elapsed time to an
//! ideal sample index and runs one mixdown whenever the index advances,
//! writing the resulting duty value to the PWM sink. There is no backlog
//! queue: scheduling delay drops samples silently, by contract, and the
//! only trace is timing telemetry. The thread is free-running for the
//! life of the process; the one termination path is process exit.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::DutySink;
use crate::mixer::{Mixer, SAMPLE_RATE};
use crate::Result;

/// Bound on catch-up mixing after a stall under [`DropPolicy::TickMissed`].
const MAX_CATCH_UP_TICKS: u64 = 1024;

/// Telemetry summary interval.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// A sample counts as late when it is emitted this far into its period.
const LATE_THRESHOLD: f64 = 0.1;

/// What to do about sample periods missed to scheduling delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPolicy {
    /// One mixdown tick per emission no matter how many periods passed.
    /// Cheapest; sustained delay audibly stretches playing sounds.
    #[default]
    CoalesceMissed,
    /// One mixdown tick per missed period (bounded), emitting only the
    /// final value. Keeps voice cursors advancing at the nominal rate at
    /// the cost of extra mixing work after a stall.
    TickMissed,
}

/// Playback driver configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Output sample rate, Hz.
    pub sample_rate: u32,
    /// Catch-up/drop behavior after scheduling delay.
    pub drop_policy: DropPolicy,
    /// Log a timing summary every ten seconds.
    pub telemetry: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            sample_rate: SAMPLE_RATE,
            drop_policy: DropPolicy::default(),
            telemetry: false,
        }
    }
}

/// One due sample reported by [`SampleClock::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    /// Ideal sample index being emitted
    pub index: u64,
    /// Whole periods skipped since the previous emission
    pub missed: u64,
    /// How far into its period the sample is, in periods (0 = on time)
    pub lateness: f64,
}

/// Pure pacing core: elapsed wall-clock time to due sample indices.
///
/// Separated from the thread loop so the pacing arithmetic is testable
/// with synthetic timestamps.
pub struct SampleClock {
    sample_rate: u32,
    last_index: u64,
}

impl SampleClock {
    /// A clock that has emitted nothing yet.
    pub fn new(sample_rate: u32) -> Self {
        SampleClock {
            sample_rate,
            last_index: 0,
        }
    }

    /// Report the sample due at `elapsed`, if the ideal index advanced
    /// past the previous emission. Skipped periods are coalesced into
    /// one emission; the caller decides what to do about them.
    pub fn poll(&mut self, elapsed: Duration) -> Option<Emission> {
        let ideal = elapsed.as_secs_f64() * self.sample_rate as f64;
        let index = ideal as u64;
        if index <= self.last_index {
            return None;
        }

        let missed = index - self.last_index - 1;
        self.last_index = index;
        Some(Emission {
            index,
            missed,
            lateness: ideal - index as f64,
        })
    }

    /// Elapsed-time deadline of the next emission, for fixed-period waits.
    pub fn next_deadline(&self) -> Duration {
        Duration::from_secs_f64((self.last_index + 1) as f64 / self.sample_rate as f64)
    }
}

/// Cumulative timing quality counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingStats {
    /// Samples actually emitted
    pub samples_emitted: u64,
    /// Sample periods lost to scheduling delay
    pub samples_dropped: u64,
    /// Emissions later than [`LATE_THRESHOLD`] of a period
    pub late_samples: u64,
    /// Worst observed lateness, in periods
    pub max_lateness: f64,
    /// Sum of all observed lateness, for averaging
    pub total_lateness: f64,
}

impl TimingStats {
    fn record(&mut self, emission: &Emission) {
        self.samples_emitted += 1;
        self.samples_dropped += emission.missed;
        self.total_lateness += emission.lateness;
        if emission.lateness > self.max_lateness {
            self.max_lateness = emission.lateness;
        }
        if emission.lateness > LATE_THRESHOLD {
            self.late_samples += 1;
        }
    }

    /// Mean lateness over all emissions, in periods.
    pub fn average_lateness(&self) -> f64 {
        if self.samples_emitted == 0 {
            0.0
        } else {
            self.total_lateness / self.samples_emitted as f64
        }
    }
}

/// Handle to the free-running playback thread.
///
/// Only carries the telemetry; there is no stop or join, the thread
/// lives until process exit.
pub struct PlaybackHandle {
    stats: Arc<Mutex<TimingStats>>,
}

impl PlaybackHandle {
    /// Snapshot of the timing counters.
    pub fn stats(&self) -> TimingStats {
        *self.stats.lock()
    }
}

/// Spawns and owns nothing but the name: the playback loop itself.
pub struct PlaybackDriver;

impl PlaybackDriver {
    /// Start the playback thread.
    ///
    /// The thread shares `mixer` with the trigger path; it holds the lock
    /// only for the duration of one mixdown tick per emission.
    pub fn spawn<S>(
        mixer: Arc<Mutex<Mixer>>,
        sink: S,
        config: PlaybackConfig,
    ) -> Result<PlaybackHandle>
    where
        S: DutySink + Send + 'static,
    {
        let stats = Arc::new(Mutex::new(TimingStats::default()));
        let thread_stats = Arc::clone(&stats);

        thread::Builder::new()
            .name("pwm-audio".into())
            .spawn(move || run(mixer, sink, config, thread_stats))?;

        log::info!(
            "audio playback running at {} Hz ({:?})",
            config.sample_rate,
            config.drop_policy
        );
        Ok(PlaybackHandle { stats })
    }
}

fn run<S: DutySink>(
    mixer: Arc<Mutex<Mixer>>,
    mut sink: S,
    config: PlaybackConfig,
    stats: Arc<Mutex<TimingStats>>,
) {
    let start = Instant::now();
    let mut clock = SampleClock::new(config.sample_rate);
    let mut last_report = Instant::now();

    loop {
        service(&mut clock, &mixer, &mut sink, &config, &stats, start.elapsed());

        if config.telemetry && last_report.elapsed() >= REPORT_INTERVAL {
            let snapshot = *stats.lock();
            log::debug!(
                "audio timing: {} emitted, {} dropped, {} late, lateness avg {:.3} max {:.3}",
                snapshot.samples_emitted,
                snapshot.samples_dropped,
                snapshot.late_samples,
                snapshot.average_lateness(),
                snapshot.max_lateness,
            );
            last_report = Instant::now();
        }

        // Fixed-period wait for the next sample boundary. Oversleeping is
        // tolerated: the clock drops the periods we miss.
        let deadline = clock.next_deadline();
        let now = start.elapsed();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            thread::yield_now();
        }
    }
}

/// One pass of the playback loop at the given elapsed time.
fn service<S: DutySink>(
    clock: &mut SampleClock,
    mixer: &Mutex<Mixer>,
    sink: &mut S,
    config: &PlaybackConfig,
    stats: &Mutex<TimingStats>,
    elapsed: Duration,
) {
    let Some(emission) = clock.poll(elapsed) else {
        return;
    };

    let ticks = match config.drop_policy {
        DropPolicy::CoalesceMissed => 1,
        DropPolicy::TickMissed => 1 + emission.missed.min(MAX_CATCH_UP_TICKS),
    };

    let duty_fraction = {
        let mut mixer = mixer.lock();
        let mut value = 0.5;
        for _ in 0..ticks {
            value = mixer.tick();
        }
        value
    };

    let duty_ns = (duty_fraction * sink.period_ns() as f32) as u32;
    if let Err(err) = sink.write_duty_ns(duty_ns) {
        log::warn!("PWM duty write failure: {err}");
    }

    stats.lock().record(&emission);
}
