use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;

/// Number of vibration bursts played each time the alert is armed.
pub const ALERT_BURST_TARGET: u32 = 15;

/// Fire-and-forget emergency alert. Armed by the screen gate whenever an
/// emergency-mode block is produced; implementations drive the device
/// vibrator (or equivalent) for [`ALERT_BURST_TARGET`] bursts.
pub trait AlertSignal: Send + Sync {
    fn arm(&self);
}

/// In-memory alert used by the harness and tests. Counts how many times
/// the signal was armed and how many bursts were played in total.
///
/// The burst counter is owned here and reset on every arm, so a re-armed
/// alert always plays the full sequence.
#[derive(Debug, Default)]
pub struct SimulatedAlertSignal {
    times_armed: AtomicU32,
    bursts_played: AtomicU32,
    current_burst: AtomicU32,
}

impl SimulatedAlertSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times_armed(&self) -> u32 {
        self.times_armed.load(Ordering::SeqCst)
    }

    pub fn bursts_played(&self) -> u32 {
        self.bursts_played.load(Ordering::SeqCst)
    }
}

impl AlertSignal for SimulatedAlertSignal {
    fn arm(&self) {
        self.times_armed.fetch_add(1, Ordering::SeqCst);
        self.current_burst.store(0, Ordering::SeqCst);

        // Simulated device: the full burst sequence completes immediately.
        while self.current_burst.fetch_add(1, Ordering::SeqCst) < ALERT_BURST_TARGET {
            self.bursts_played.fetch_add(1, Ordering::SeqCst);
        }

        info!("emergency alert armed, played {} bursts", ALERT_BURST_TARGET);
    }
}
