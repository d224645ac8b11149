/// One alert per contiguous run of "available" readings.
#[derive(Debug, Default, Clone)]
pub struct AlertDeduplicator {
    alerted_for_current_availability: bool,
}

impl AlertDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this reading opens a new availability run.
    pub fn on_available(&mut self) -> bool {
        let should_alert = !self.alerted_for_current_availability;
        self.alerted_for_current_availability = true;
        should_alert
    }

    pub fn on_unavailable(&mut self) {
        self.alerted_for_current_availability = false;
    }
}
