//! Competition lifecycle: the mode the field controller puts the robot in

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Mode of the robot as set by the competition-state authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompetitionMode {
    /// Stop signal: active and queued motions are cancelled, outputs zeroed
    #[default]
    Disabled,
    Autonomous,
    DriverControl,
}

impl CompetitionMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CompetitionMode::Disabled)
    }

    /// Whether tank-drive input reaches the motors
    pub fn accepts_driver_input(&self) -> bool {
        matches!(self, CompetitionMode::DriverControl)
    }
}

impl fmt::Display for CompetitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompetitionMode::Disabled => "disabled",
            CompetitionMode::Autonomous => "autonomous",
            CompetitionMode::DriverControl => "driver control",
        };
        f.write_str(name)
    }
}

/// Shared handle for changing the competition mode.
///
/// The control loop samples the mode once per tick, so a change takes
/// effect within one period.
#[derive(Debug, Clone)]
pub struct CompetitionSwitch {
    tx: Arc<watch::Sender<CompetitionMode>>,
}

impl CompetitionSwitch {
    pub fn new(initial: CompetitionMode) -> Self {
        let (tx, _rx) = watch::channel(initial);
        CompetitionSwitch { tx: Arc::new(tx) }
    }

    pub fn set(&self, mode: CompetitionMode) {
        let previous = self.tx.send_replace(mode);
        if previous != mode {
            log::info!("Competition mode: {} -> {}", previous, mode);
        }
    }

    pub fn get(&self) -> CompetitionMode {
        *self.tx.borrow()
    }

    /// Assert the global stop signal
    pub fn disable(&self) {
        self.set(CompetitionMode::Disabled);
    }

    pub fn subscribe(&self) -> watch::Receiver<CompetitionMode> {
        self.tx.subscribe()
    }
}
