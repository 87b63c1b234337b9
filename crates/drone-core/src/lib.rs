//! # Drone Core
//!
//! Core domain types for the Tello face-tracking controller.
//! This crate provides the flight command vocabulary shared by the
//! operator surface, the patrol loop and the face tracker, plus the
//! port abstraction all of them send through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod port;

pub use error::{CoreError, CoreResult, LinkError, LinkResult};
pub use port::{FlightCommandPort, LinkEvent};

/// Speed used for relative moves until an operator changes it
pub const DEFAULT_SPEED: u8 = 10;

/// Upper bound accepted by the drone for stick values
pub const MAX_SPEED: u8 = 100;

/// Lowest speed an operator can set
pub const MIN_SPEED: u8 = 1;

/// Clamp an operator-supplied speed into `MIN_SPEED..=MAX_SPEED`
pub fn clamp_speed(speed: u32) -> u8 {
    speed.clamp(u32::from(MIN_SPEED), u32::from(MAX_SPEED)) as u8
}

// ============================================================================
// FLIGHT COMMANDS
// ============================================================================

/// Relative motion directions understood by the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Clockwise,
    CounterClockwise,
    Forward,
    Backward,
    Right,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Clockwise,
        Direction::CounterClockwise,
        Direction::Forward,
        Direction::Backward,
        Direction::Right,
        Direction::Left,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Clockwise => "clockwise",
            Direction::CounterClockwise => "counterClockwise",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Right => "right",
            Direction::Left => "left",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single command transmitted to the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlightCommand {
    TakeOff,
    Land,
    /// Zero every stick axis
    Hover,
    /// Zero the yaw axis only
    CeaseRotation,
    Move { direction: Direction, speed: u8 },
}

impl FlightCommand {
    pub fn move_in(direction: Direction, speed: u8) -> Self {
        Self::Move {
            direction,
            speed: speed.min(MAX_SPEED),
        }
    }

    /// Short label used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            FlightCommand::TakeOff => "takeOff",
            FlightCommand::Land => "land",
            FlightCommand::Hover => "hover",
            FlightCommand::CeaseRotation => "ceaseRotation",
            FlightCommand::Move { direction, .. } => direction.as_str(),
        }
    }
}

impl fmt::Display for FlightCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightCommand::Move { direction, speed } => write!(f, "{}({})", direction, speed),
            other => f.write_str(other.kind()),
        }
    }
}

// ============================================================================
// OPERATOR COMMANDS
// ============================================================================

/// Command names accepted from the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorCommand {
    CeaseRotation,
    TakeOff,
    Land,
    Hover,
    Move(Direction),
    Patrol,
    StopPatrol,
    FaceDetectTracking,
    StopFaceDetectTracking,
    Snapshot,
}

impl OperatorCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorCommand::CeaseRotation => "ceaseRotation",
            OperatorCommand::TakeOff => "takeOff",
            OperatorCommand::Land => "land",
            OperatorCommand::Hover => "hover",
            OperatorCommand::Move(direction) => direction.as_str(),
            OperatorCommand::Patrol => "patrol",
            OperatorCommand::StopPatrol => "stopPatrol",
            OperatorCommand::FaceDetectTracking => "faceDetectTracking",
            OperatorCommand::StopFaceDetectTracking => "stopFaceDetectTracking",
            OperatorCommand::Snapshot => "snapshot",
        }
    }
}

impl FromStr for OperatorCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "ceaseRotation" => OperatorCommand::CeaseRotation,
            "takeOff" => OperatorCommand::TakeOff,
            "land" => OperatorCommand::Land,
            "hover" => OperatorCommand::Hover,
            "patrol" => OperatorCommand::Patrol,
            "stopPatrol" => OperatorCommand::StopPatrol,
            "faceDetectTracking" => OperatorCommand::FaceDetectTracking,
            "stopFaceDetectTracking" => OperatorCommand::StopFaceDetectTracking,
            "snapshot" => OperatorCommand::Snapshot,
            other => Direction::ALL
                .into_iter()
                .find(|d| d.as_str() == other)
                .map(OperatorCommand::Move)
                .ok_or_else(|| CoreError::unknown_command(other))?,
        };
        Ok(command)
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FACE DETECTION MODELS
// ============================================================================

/// Face detection result, corners in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl FaceBox {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn from_rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Center point, halving with integer division
    pub fn center(&self) -> (i32, i32) {
        (
            self.min_x + self.width() / 2,
            self.min_y + self.height() / 2,
        )
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }
}

// ============================================================================
// STATE VIEW
// ============================================================================

/// Snapshot of the controller flags for the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneState {
    pub speed: u8,
    pub patrolling: bool,
    pub tracking: bool,
    pub connected: bool,
}

// ============================================================================
// TESTS
// ============================================================================
