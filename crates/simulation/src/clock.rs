/// The scheduler's virtual time, in simulated ticks since the run began.
/// A drift factor is applied multiplicatively whenever a node reads
/// "now", modeling clock skew without perturbing the scheduler's own
/// ordering (which always advances on the undrifted time).
#[derive(Clone, Copy, Debug, Default)]
pub struct VirtualClock {
    now: u64,
    drift_factor: f64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            now: 0,
            drift_factor: 1.0,
        }
    }

    pub fn with_drift_factor(drift_factor: f64) -> Self {
        Self {
            now: 0,
            drift_factor,
        }
    }

    /// The scheduler's own time, undrifted. Used for task ordering.
    pub fn raw_now(&self) -> u64 {
        self.now
    }

    /// What a node observes when it reads "now": `raw_now` scaled by the
    /// drift factor.
    pub fn observed_now(&self) -> u64 {
        (self.now as f64 * self.drift_factor).round() as u64
    }

    pub fn set_drift_factor(&mut self, drift_factor: f64) {
        self.drift_factor = drift_factor;
    }

    pub(crate) fn advance_to(&mut self, time: u64) {
        debug_assert!(time >= self.now, "virtual clock must not move backward");
        self.now = time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undrifted_clock_reads_raw_time() {
        let mut clock = VirtualClock::new();
        clock.advance_to(10);
        assert_eq!(clock.observed_now(), 10);
    }

    #[test]
    fn drift_factor_scales_observed_time() {
        let mut clock = VirtualClock::with_drift_factor(2.0);
        clock.advance_to(10);
        assert_eq!(clock.observed_now(), 20);
        assert_eq!(clock.raw_now(), 10);
    }
}
