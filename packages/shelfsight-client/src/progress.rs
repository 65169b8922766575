use serde::{Deserialize, Serialize};

/// Upload bytes map into this reserved low band.
pub const TRANSFER_FLOOR: f64 = 5.0;
pub const TRANSFER_CEILING: f64 = 30.0;

/// Synthetic processing progress climbs at this rate (percent per second)
/// and saturates below the ceiling; only a real response moves past it.
pub const PROCESSING_RATE: f64 = 0.75;
pub const PROCESSING_CEILING: f64 = 90.0;

pub const COMPLETE_PERCENT: f64 = 100.0;

/// Transfer-phase mapping: bytes-sent fraction scaled into the reserved
/// band. An unknown total pins the value to the floor.
pub fn transfer_percent(sent_bytes: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return TRANSFER_FLOOR;
    }
    let fraction = (sent_bytes as f64 / total_bytes as f64).clamp(0.0, 1.0);
    TRANSFER_FLOOR + (TRANSFER_CEILING - TRANSFER_FLOOR) * fraction
}

/// Processing-phase mapping driven by elapsed seconds alone.
pub fn synthetic_percent(elapsed_secs: u64) -> f64 {
    (TRANSFER_FLOOR + PROCESSING_RATE * elapsed_secs as f64).min(PROCESSING_CEILING)
}

/// Monotone progress value for one analysis run. Candidates from either
/// phase pass through a max-with-current clamp, so the reading never
/// regresses no matter how callbacks and ticks interleave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressGauge {
    percent: f64,
}

impl Default for ProgressGauge {
    fn default() -> Self {
        Self::idle()
    }
}

impl ProgressGauge {
    pub fn idle() -> Self {
        Self { percent: 0.0 }
    }

    /// Gauge position the moment a submission is accepted.
    pub fn started() -> Self {
        Self {
            percent: TRANSFER_FLOOR,
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= COMPLETE_PERCENT
    }

    pub fn record_transfer(&mut self, sent_bytes: u64, total_bytes: u64) {
        self.advance_to(transfer_percent(sent_bytes, total_bytes));
    }

    /// Apply one elapsed-timer tick. A candidate that has reached the
    /// ceiling leaves the gauge unchanged, keeping the reading strictly
    /// below the ceiling until a response arrives.
    pub fn record_tick(&mut self, elapsed_secs: u64) {
        let candidate = synthetic_percent(elapsed_secs);
        if candidate < PROCESSING_CEILING {
            self.advance_to(candidate);
        }
    }

    /// Success lands on exactly 100.
    pub fn complete(&mut self) {
        self.percent = COMPLETE_PERCENT;
    }

    /// Failure and reset clear the reading.
    pub fn clear(&mut self) {
        self.percent = 0.0;
    }

    fn advance_to(&mut self, candidate: f64) {
        if candidate > self.percent {
            self.percent = candidate;
        }
    }
}
