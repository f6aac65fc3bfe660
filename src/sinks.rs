/// Host-side output sink
///
/// `TracingPin` stands in for the GPIO output and the status LED: it keeps
/// the logical level and reports every change through `tracing`.

use crate::hal::{OutputLevel, OutputSink, Status};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Default)]
pub struct TracingPin {
    name: String,
    level: OutputLevel,
    transitions: u64,
    last_status: Option<Status>,
}

impl TracingPin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn level(&self) -> OutputLevel {
        self.level
    }

    /// Level changes so far; repeated writes of the same level do not count
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn last_status(&self) -> Option<Status> {
        self.last_status
    }

    fn drive(&mut self, level: OutputLevel) {
        if self.level != level {
            self.transitions += 1;
            info!("{} -> {:?}", self.name, level);
        } else {
            trace!("{} stays {:?}", self.name, level);
        }
        self.level = level;
    }
}

impl OutputSink for TracingPin {
    fn set_high(&mut self) {
        self.drive(OutputLevel::High);
    }

    fn set_low(&mut self) {
        self.drive(OutputLevel::Low);
    }

    fn signal(&mut self, status: Status) {
        match status {
            Status::AwaitingTrigger | Status::Capturing => trace!("{}: {:?}", self.name, status),
            Status::TrainedLight => {
                info!("{}: light reference stored", self.name);
                self.drive(OutputLevel::High);
            }
            Status::TrainedDark => {
                info!("{}: dark reference stored", self.name);
                self.drive(OutputLevel::Low);
            }
            _ => debug!("{}: {:?}", self.name, status),
        }
        self.last_status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_starts_low() {
        let pin = TracingPin::new("output");
        assert_eq!(pin.level(), OutputLevel::Low);
        assert_eq!(pin.transitions(), 0);
        assert_eq!(pin.last_status(), None);
    }

    #[test]
    fn test_transitions_counted_once() {
        let mut pin = TracingPin::new("output");
        pin.set_high();
        pin.set_high();
        pin.set_low();

        assert_eq!(pin.level(), OutputLevel::Low);
        assert_eq!(pin.transitions(), 2);
    }

    #[test]
    fn test_training_signals_leave_level() {
        let mut pin = TracingPin::new("output");

        pin.signal(Status::TrainedLight);
        assert_eq!(pin.level(), OutputLevel::High);

        pin.signal(Status::TrainedDark);
        assert_eq!(pin.level(), OutputLevel::Low);

        pin.signal(Status::NoiseRejected);
        assert_eq!(pin.level(), OutputLevel::Low);
        assert_eq!(pin.last_status(), Some(Status::NoiseRejected));
    }
}
