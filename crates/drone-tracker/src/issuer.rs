//! Shared access to the flight command port
//!
//! Manual commands, patrol ticks and the tracking loop all send through a
//! clone of the same issuer. Transport failures are logged and counted here
//! and never reach the caller.

use drone_core::{Direction, FlightCommand, FlightCommandPort};
use drone_telemetry::MetricsCollector;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CommandIssuer {
    port: Arc<dyn FlightCommandPort>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CommandIssuer {
    pub fn new(port: Arc<dyn FlightCommandPort>) -> Self {
        Self { port, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Send one command; returns whether the port accepted it
    pub fn issue(&self, command: FlightCommand) -> bool {
        if let Some(metrics) = &self.metrics {
            metrics.record_command(&command);
        }

        match self.port.send(command) {
            Ok(()) => {
                debug!("Issued {}", command);
                true
            }
            Err(e) => {
                warn!("Failed to send {}: {}", command, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_command_failure(&command);
                }
                false
            }
        }
    }

    pub fn hover(&self) -> bool {
        self.issue(FlightCommand::Hover)
    }

    pub fn move_in(&self, direction: Direction, speed: u8) -> bool {
        self.issue(FlightCommand::move_in(direction, speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPort;
    use drone_core::{LinkError, LinkResult};
    use mockall::mock;

    mock! {
        Port {}
        impl FlightCommandPort for Port {
            fn send(&self, command: FlightCommand) -> LinkResult<()>;
        }
    }

    #[test]
    fn test_issue_forwards_to_port() {
        let port = RecordingPort::new();
        let issuer = CommandIssuer::new(port.clone());

        assert!(issuer.hover());
        assert!(issuer.move_in(Direction::Up, 25));

        assert_eq!(
            port.commands(),
            vec![FlightCommand::Hover, FlightCommand::move_in(Direction::Up, 25)]
        );
    }

    #[test]
    fn test_transport_errors_are_swallowed_and_counted() {
        let mut port = MockPort::new();
        port.expect_send()
            .times(1)
            .returning(|_| Err(LinkError::Closed));

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let issuer = CommandIssuer::new(Arc::new(port)).with_metrics(metrics.clone());

        assert!(!issuer.issue(FlightCommand::Land));

        let export = metrics.export();
        assert!(export.contains(r#"gotello_command_failures_total{command="land"} 1"#));
    }
}
