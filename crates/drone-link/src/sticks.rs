//! Stick state and SDK wire text
//!
//! The drone flies from four virtual stick axes. A relative move sets a
//! single axis and leaves the others where they are, so several moves sent
//! back to back combine into one diagonal motion until the next hover.

use drone_core::{Direction, FlightCommand, MAX_SPEED};

/// Current stick deflection, each axis in `-100..=100`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickState {
    /// Left (-) / right (+)
    pub roll: i16,
    /// Backward (-) / forward (+)
    pub pitch: i16,
    /// Down (-) / up (+)
    pub throttle: i16,
    /// Counter-clockwise (-) / clockwise (+)
    pub yaw: i16,
}

impl StickState {
    /// Apply a command and return the SDK text to transmit
    pub fn apply(&mut self, command: FlightCommand) -> String {
        match command {
            FlightCommand::TakeOff => {
                *self = Self::default();
                "takeoff".into()
            }
            FlightCommand::Land => {
                *self = Self::default();
                "land".into()
            }
            FlightCommand::Hover => {
                *self = Self::default();
                self.rc()
            }
            FlightCommand::CeaseRotation => {
                self.yaw = 0;
                self.rc()
            }
            FlightCommand::Move { direction, speed } => {
                let value = speed.min(MAX_SPEED) as i16;
                match direction {
                    Direction::Right => self.roll = value,
                    Direction::Left => self.roll = -value,
                    Direction::Forward => self.pitch = value,
                    Direction::Backward => self.pitch = -value,
                    Direction::Up => self.throttle = value,
                    Direction::Down => self.throttle = -value,
                    Direction::Clockwise => self.yaw = value,
                    Direction::CounterClockwise => self.yaw = -value,
                }
                self.rc()
            }
        }
    }

    fn rc(&self) -> String {
        format!("rc {} {} {} {}", self.roll, self.pitch, self.throttle, self.yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_accumulate_until_hover() {
        let mut sticks = StickState::default();
        assert_eq!(sticks.apply(FlightCommand::move_in(Direction::Right, 15)), "rc 15 0 0 0");
        assert_eq!(sticks.apply(FlightCommand::move_in(Direction::Up, 25)), "rc 15 0 25 0");
        assert_eq!(sticks.apply(FlightCommand::move_in(Direction::Backward, 10)), "rc 15 -10 25 0");
        assert_eq!(sticks.apply(FlightCommand::Hover), "rc 0 0 0 0");
        assert_eq!(sticks, StickState::default());
    }

    #[test]
    fn test_opposite_direction_overrides_axis() {
        let mut sticks = StickState::default();
        sticks.apply(FlightCommand::move_in(Direction::Left, 30));
        assert_eq!(sticks.apply(FlightCommand::move_in(Direction::Right, 10)), "rc 10 0 0 0");
    }

    #[test]
    fn test_cease_rotation_only_clears_yaw() {
        let mut sticks = StickState::default();
        sticks.apply(FlightCommand::move_in(Direction::CounterClockwise, 40));
        sticks.apply(FlightCommand::move_in(Direction::Forward, 20));
        assert_eq!(sticks.apply(FlightCommand::CeaseRotation), "rc 0 20 0 0");
    }

    #[test]
    fn test_takeoff_and_land_reset_sticks() {
        let mut sticks = StickState::default();
        sticks.apply(FlightCommand::move_in(Direction::Down, 50));
        assert_eq!(sticks.apply(FlightCommand::Land), "land");
        assert_eq!(sticks, StickState::default());
        assert_eq!(sticks.apply(FlightCommand::TakeOff), "takeoff");
    }
}
