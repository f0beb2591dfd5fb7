//! LoRaWAN device class implementations
//!
//! This module contains the two supported device classes:
//! - Class A: Basic bi-directional communication with two receive windows after each uplink
//! - Class C: Continuous receive except when transmitting
//!
//! A Class C device still transmits through the Class A cycle. The
//! [`ClassController`] tracks the class the application asked for and the one
//! the radio is currently running.

/// Class A transmit/receive cycle
pub mod class_a;

/// Class C continuous reception
pub mod class_c;

pub use class_a::RxWindow;

use crate::config::device::DeviceClass;

/// Work queued for the next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Nothing pending
    None,
    /// Transmit the pending payload
    Uplink,
    /// Transmit an empty frame acknowledging the last confirmed downlink
    Ack,
}

/// Class state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassController {
    desired: DeviceClass,
    running: DeviceClass,
}

impl Default for ClassController {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassController {
    /// Both desired and running class A
    pub const fn new() -> Self {
        Self {
            desired: DeviceClass::A,
            running: DeviceClass::A,
        }
    }

    /// Class requested by the application
    pub fn desired(&self) -> DeviceClass {
        self.desired
    }

    /// Class the radio is currently operated in
    pub fn running(&self) -> DeviceClass {
        self.running
    }

    /// Request a class; applied by the next tick
    pub fn set_desired(&mut self, class: DeviceClass) {
        self.desired = class;
    }

    /// Drop to class A ahead of a transmission
    pub fn force_a(&mut self) {
        self.running = DeviceClass::A;
    }

    /// Class the radio should switch to, if any
    pub fn pending_transition(&self) -> Option<DeviceClass> {
        if self.desired == self.running {
            None
        } else {
            Some(self.desired)
        }
    }

    /// Record that the radio now runs `class`
    pub fn set_running(&mut self, class: DeviceClass) {
        self.running = class;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_follows_desired_class() {
        let mut classes = ClassController::new();
        assert_eq!(classes.pending_transition(), None);

        classes.set_desired(DeviceClass::C);
        assert_eq!(classes.pending_transition(), Some(DeviceClass::C));
        classes.set_running(DeviceClass::C);
        assert_eq!(classes.pending_transition(), None);

        classes.force_a();
        assert_eq!(classes.running(), DeviceClass::A);
        assert_eq!(classes.pending_transition(), Some(DeviceClass::C));

        classes.set_desired(DeviceClass::A);
        assert_eq!(classes.pending_transition(), None);
    }
}
