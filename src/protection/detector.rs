use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Minimum number of in-window observations before any rule is evaluated.
const MIN_HISTORY: usize = 3;

/// One observed record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub count: usize,
    pub observed_at: Instant,
}

/// A rule that fired for the latest observation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransientSignal {
    Oscillation {
        changes: usize,
        window: Duration,
        pattern: String,
    },
    SuddenDrop {
        decrease: f64,
        previous_average: f64,
        current: usize,
    },
}

impl fmt::Display for TransientSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientSignal::Oscillation {
                changes,
                window,
                pattern,
            } => write!(
                f,
                "oscillation detected: {changes} count changes within {window:?} window, pattern: {pattern}"
            ),
            TransientSignal::SuddenDrop {
                decrease,
                previous_average,
                current,
            } => write!(
                f,
                "sudden drop detected: {:.0}% decrease (avg {:.1} to {})",
                decrease * 100.0,
                previous_average,
                current
            ),
        }
    }
}

/// Verdict for one observation. Trusted when no signal fired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    signals: Vec<TransientSignal>,
}

impl Classification {
    pub fn trusted() -> Self {
        Self::default()
    }

    pub fn is_transient(&self) -> bool {
        !self.signals.is_empty()
    }

    pub fn signals(&self) -> &[TransientSignal] {
        &self.signals
    }

    pub fn has_oscillation(&self) -> bool {
        self.signals
            .iter()
            .any(|signal| matches!(signal, TransientSignal::Oscillation { .. }))
    }

    pub fn has_sudden_drop(&self) -> bool {
        self.signals
            .iter()
            .any(|signal| matches!(signal, TransientSignal::SuddenDrop { .. }))
    }

    /// Human-readable reason; empty when trusted.
    pub fn reason(&self) -> String {
        self.signals
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Classifies record counts as trustworthy or likely transient using two
/// independent rules over a sliding time window: oscillation (the count keeps
/// changing) and sudden drop (the count fell well below the recent average).
///
/// History is pruned on every call, never on a timer.
#[derive(Debug)]
pub struct TransientDetector {
    history: Mutex<VecDeque<Snapshot>>,
    window: Duration,
    oscillation_threshold: usize,
    drop_threshold: f64,
}

impl TransientDetector {
    pub fn new(window: Duration, oscillation_threshold: usize, drop_threshold: f64) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            window,
            oscillation_threshold,
            drop_threshold,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn classify(&self, current_count: usize) -> Classification {
        self.classify_at(current_count, Instant::now())
    }

    pub fn classify_at(&self, current_count: usize, now: Instant) -> Classification {
        let (classification, history_len) = self.observe(current_count, now);
        if classification.is_transient() {
            warn!(
                "event=transient_classified count={} history_len={} reason=\"{}\"",
                current_count,
                history_len,
                classification.reason()
            );
        } else if history_len < MIN_HISTORY {
            debug!(
                "event=detector_warmup count={} history_len={}",
                current_count, history_len
            );
        }
        classification
    }

    /// Records the observation and evaluates both rules under the lock.
    fn observe(&self, current_count: usize, now: Instant) -> (Classification, usize) {
        let mut history = self.history.lock();
        let window = self.window;
        history.retain(|entry| now.saturating_duration_since(entry.observed_at) < window);
        // Concurrent callers may sample `now` before contending for the lock.
        let position = history.partition_point(|entry| entry.observed_at <= now);
        history.insert(
            position,
            Snapshot {
                count: current_count,
                observed_at: now,
            },
        );

        if history.len() < MIN_HISTORY {
            return (Classification::trusted(), history.len());
        }

        let mut signals = Vec::new();
        let changes = history
            .iter()
            .zip(history.iter().skip(1))
            .filter(|(prev, next)| prev.count != next.count)
            .count();
        if changes >= self.oscillation_threshold {
            signals.push(TransientSignal::Oscillation {
                changes,
                window,
                pattern: format_pattern(&history, now),
            });
        }

        let (sum, prior) = history
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != position)
            .fold((0u128, 0usize), |(sum, n), (_, entry)| {
                (sum + entry.count as u128, n + 1)
            });
        if prior > 0 {
            let average = sum as f64 / prior as f64;
            if average > 0.0 {
                let decrease = (average - current_count as f64) / average;
                if decrease > self.drop_threshold {
                    signals.push(TransientSignal::SuddenDrop {
                        decrease,
                        previous_average: average,
                        current: current_count,
                    });
                }
            }
        }

        (Classification { signals }, history.len())
    }

    /// Number of observations held, as of the last classification.
    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    /// Copy of the current in-window history, oldest first.
    pub fn history(&self) -> Vec<Snapshot> {
        self.history.lock().iter().copied().collect()
    }
}

fn format_pattern(history: &VecDeque<Snapshot>, now: Instant) -> String {
    history
        .iter()
        .map(|entry| {
            let age = now.saturating_duration_since(entry.observed_at);
            format!("{}@-{:.1}s", entry.count, age.as_secs_f64())
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
