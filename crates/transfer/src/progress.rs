use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How far back throughput is averaged.
const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
const MAX_SAMPLES: usize = 128;

/// Throughput and ETA over a sliding time window.
///
/// Uploads report once per finished part, so samples are sparse and
/// part-sized. The rate is measured from the start of the window (the
/// oldest retained sample, or the moment tracking began) to the newest
/// sample.
pub struct SpeedCalculator {
    window: Duration,
    state: Mutex<Window>,
}

struct Window {
    /// `(when, bytes)` per completed part, oldest first.
    samples: VecDeque<(Instant, u64)>,
    /// Start of the measured interval when nothing has been evicted.
    origin: Instant,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }
}

impl SpeedCalculator {
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(Window {
                samples: VecDeque::new(),
                origin: Instant::now(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, Window> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `bytes` finished just now.
    pub fn add_sample(&self, bytes: u64) {
        let now = Instant::now();
        let mut w = self.state();
        w.samples.push_back((now, bytes));

        let cutoff = now.checked_sub(self.window);
        while let Some(&(at, _)) = w.samples.front() {
            let stale = cutoff.is_some_and(|c| at < c);
            if !stale && w.samples.len() <= MAX_SAMPLES {
                break;
            }
            // Evicted samples move the interval start forward.
            w.origin = at;
            w.samples.pop_front();
        }
    }

    /// Bytes per second over the window, `0.0` before any sample.
    pub fn bytes_per_second(&self) -> f64 {
        let w = self.state();
        let Some(&(newest, _)) = w.samples.back() else {
            return 0.0;
        };

        let bytes: u64 = w.samples.iter().map(|&(_, b)| b).sum();
        let elapsed = newest.saturating_duration_since(w.origin);
        if elapsed.is_zero() {
            return 0.0;
        }
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Time left for `remaining_bytes` at the current rate.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        (rate > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }

    /// Forgets all samples and restarts the clock.
    pub fn reset(&self) {
        let mut w = self.state();
        w.samples.clear();
        w.origin = Instant::now();
    }
}
