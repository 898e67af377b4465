//! Running record of how well a peer agreed with local results.

/// Accumulated agreement measurements for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrustLedger {
    points: f64,
    events: u32,
}

impl TrustLedger {
    /// Record one measured agreement score. Non-finite scores are ignored.
    pub fn record(&mut self, score: f64) {
        if score.is_finite() {
            self.points += score;
            self.events += 1;
        }
    }

    /// Mean of every recorded score, if any.
    pub fn average(&self) -> Option<f64> {
        (self.events > 0).then(|| self.points / f64::from(self.events))
    }

    pub fn events(&self) -> u32 {
        self.events
    }
}
