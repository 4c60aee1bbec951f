//! Power controller trait
//!
//! The uniform surface every backend implements. Callers that only need
//! "turn X on/off" hold a `Box<dyn PowerController>` and never see the
//! transport underneath.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{PowerError, Result};
use crate::types::Target;

/// Default pause between the off and on halves of a power cycle
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(10);

/// Trait for power management operations
#[async_trait]
pub trait PowerController: Send + Sync {
    /// Short backend name (`ipmi`, `pdu`, `ccsg`, `dli`, `system`)
    fn backend_name(&self) -> &'static str;

    /// Request a named state from the backend's legal set
    ///
    /// The name is parsed into the backend's state enum before anything
    /// is sent, so unknown names fail without touching the device.
    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()>;

    /// Power on
    async fn power_on(&self, target: Option<&Target>) -> Result<()>;

    /// Power off
    async fn power_off(&self, target: Option<&Target>) -> Result<()>;

    /// Power cycle
    ///
    /// Backends without a native cycle get off, `cycle_delay`, on.
    async fn power_cycle(&self, target: Option<&Target>) -> Result<()> {
        self.power_off(target).await?;
        tokio::time::sleep(self.cycle_delay()).await;
        self.power_on(target).await
    }

    /// Pause used by the default `power_cycle`
    fn cycle_delay(&self) -> Duration {
        DEFAULT_CYCLE_DELAY
    }

    /// Check if the controller supports a specific operation
    fn supports_operation(&self, op: PowerOperation) -> bool;

    /// Release remote resources such as sessions
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Operations for capability checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOperation {
    PowerOn,
    PowerOff,
    PowerCycle,
    SetState,
}

/// Outlet number from an optional per-call target
pub(crate) fn outlet_from(target: Option<&Target>, backend: &str) -> Result<Option<u32>> {
    match target {
        None => Ok(None),
        Some(Target::Outlet(n)) => Ok(Some(*n)),
        Some(other) => Err(PowerError::InvalidConfig(format!(
            "{} controller addresses outlets, got {}",
            backend, other
        ))),
    }
}

/// Device name from an optional per-call target
pub(crate) fn device_from<'a>(target: Option<&'a Target>, backend: &str) -> Result<Option<&'a str>> {
    match target {
        None => Ok(None),
        Some(Target::Device(name)) => Ok(Some(name.as_str())),
        Some(other) => Err(PowerError::InvalidConfig(format!(
            "{} controller addresses devices, got {}",
            backend, other
        ))),
    }
}

/// Reject targets for backends that act on the whole host
pub(crate) fn no_target(target: Option<&Target>, backend: &str) -> Result<()> {
    match target {
        None => Ok(()),
        Some(other) => Err(PowerError::InvalidConfig(format!(
            "{} controller does not address individual targets, got {}",
            backend, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Records the sequence of calls made through the trait
    struct MockController {
        calls: Mutex<Vec<String>>,
    }

    impl MockController {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PowerController for MockController {
        fn backend_name(&self) -> &'static str {
            "mock"
        }

        async fn set_state(&self, state: &str, _target: Option<&Target>) -> Result<()> {
            self.calls.lock().unwrap().push(format!("set {}", state));
            Ok(())
        }

        async fn power_on(&self, target: Option<&Target>) -> Result<()> {
            self.set_state("on", target).await
        }

        async fn power_off(&self, target: Option<&Target>) -> Result<()> {
            self.set_state("off", target).await
        }

        fn supports_operation(&self, _op: PowerOperation) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_power_cycle_is_off_then_on() {
        let controller = MockController::new();
        let started = tokio::time::Instant::now();

        controller.power_cycle(None).await.unwrap();

        assert_eq!(controller.calls(), vec!["set off", "set on"]);
        assert!(started.elapsed() >= DEFAULT_CYCLE_DELAY);
        controller.close().await.unwrap();
    }

    #[test]
    fn test_target_helpers() {
        let outlet = Target::Outlet(4);
        let device = Target::Device("node".to_string());

        assert_eq!(outlet_from(Some(&outlet), "pdu").unwrap(), Some(4));
        assert_eq!(outlet_from(None, "pdu").unwrap(), None);
        assert!(outlet_from(Some(&device), "pdu").is_err());

        assert_eq!(device_from(Some(&device), "ccsg").unwrap(), Some("node"));
        assert!(device_from(Some(&outlet), "ccsg").is_err());

        assert!(no_target(None, "ipmi").is_ok());
        assert!(no_target(Some(&outlet), "ipmi").is_err());
    }
}
