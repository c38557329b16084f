//! Headless driver: a session over the simulator, ticked on a fixed cadence.

use std::str::FromStr;
use std::time::Duration;

use anvil_common::{Clock, ManualClock, SimTime, SystemClock};
use anvil_protocol::ParamType;
use anvil_session::{ConnectionState, Session, SessionError};
use anvil_sim::DeviceSimulator;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};

/// A clock the runner can wait on between ticks.
pub trait Pace: Clock + Clone {
    /// Let `interval` pass.
    fn pause(&self, interval: Duration);
}

impl Pace for SystemClock {
    fn pause(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

impl Pace for ManualClock {
    fn pause(&self, interval: Duration) {
        self.advance(SimTime::from(interval));
    }
}

/// One `ID=VALUE` write request from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Parameter id.
    pub id: u8,
    /// Raw value, interpreted by the parameter's type.
    pub value: String,
}

impl FromStr for Assignment {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, value) = s
            .split_once('=')
            .ok_or_else(|| RunnerError::invalid(format!("expected ID=VALUE, got '{}'", s)))?;
        let id = id
            .trim()
            .parse::<u8>()
            .map_err(|_| RunnerError::invalid(format!("parameter id '{}' is not 0-255", id.trim())))?;
        Ok(Assignment {
            id,
            value: value.to_string(),
        })
    }
}

fn parse_toggle(raw: &str) -> RunnerResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        other => Err(RunnerError::invalid(format!("'{}' is not a toggle value", other))),
    }
}

fn parse_number(raw: &str) -> RunnerResult<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RunnerError::invalid(format!("'{}' is not a number", raw)))
}

/// Drives one [`Session`] against a [`DeviceSimulator`].
pub struct Runner<C: Pace> {
    session: Session<DeviceSimulator<C>, C>,
    clock: C,
    tick_interval: Duration,
    timeout: Duration,
}

impl<C: Pace> Runner<C> {
    /// Build the simulator and session, skipping the welcome screen.
    pub fn new(config: &RunnerConfig, clock: C) -> RunnerResult<Self> {
        let sim = DeviceSimulator::from_config(&config.simulator, clock.clone())?;
        let mut session = Session::new(sim, clock.clone(), config.session.clone());
        session.dismiss_welcome();
        Ok(Runner {
            session,
            clock,
            tick_interval: config.tick_interval().max(Duration::from_millis(1)),
            timeout: config.timeout(),
        })
    }

    /// The underlying session.
    pub fn session(&self) -> &Session<DeviceSimulator<C>, C> {
        &self.session
    }

    /// Simulated port identities.
    pub fn ports(&self) -> Vec<String> {
        self.session.list_ports()
    }

    /// Connect and wait until the parameter table is live.
    pub fn connect(&mut self, port: &str, baud_rate: Option<u32>) -> RunnerResult<()> {
        let baud_rate = baud_rate.unwrap_or(self.session.baud_rate());
        if !self.session.baud_rates().contains(&baud_rate) {
            warn!("Runner: {} is not a standard baud rate", baud_rate);
        }
        self.session.connect(port, baud_rate)?;
        self.wait_for("the device configuration", |s| s.state().is_connected())?;
        info!(
            "Runner: connected to {} ({} parameters)",
            port,
            self.session.parameters().len()
        );
        Ok(())
    }

    /// Apply writes in order, then wait for every acknowledgment.
    ///
    /// Returns how many writes went out; unchanged values are not resent.
    pub fn apply(&mut self, assignments: &[Assignment]) -> RunnerResult<usize> {
        let mut sent = 0;
        for assignment in assignments {
            if self.apply_one(assignment)? {
                sent += 1;
            } else {
                debug!("Runner: parameter {} unchanged", assignment.id);
            }
        }
        self.wait_for("write acknowledgments", |s| s.pending_writes() == 0)?;
        Ok(sent)
    }

    fn apply_one(&mut self, assignment: &Assignment) -> RunnerResult<bool> {
        let Assignment { id, value } = assignment;
        let param_type = self
            .session
            .parameter(*id)
            .map(|p| p.param_type)
            .ok_or(SessionError::UnknownParameter(*id))?;

        let sent = match param_type {
            ParamType::Toggle => {
                self.session.set_toggle(*id, parse_toggle(value)?)?;
                true
            }
            ParamType::Slider => self.session.set_slider(*id, parse_number(value)?)?,
            ParamType::Numeric => self.session.set_numeric(*id, parse_number(value)?)?,
            ParamType::String => self.session.set_string(*id, value)?,
        };
        Ok(sent)
    }

    /// Close the link if one is up.
    pub fn disconnect(&mut self) -> RunnerResult<()> {
        if self.session.state().has_link() {
            self.session.disconnect()?;
        }
        Ok(())
    }

    fn wait_for(
        &mut self,
        what: &'static str,
        done: impl Fn(&Session<DeviceSimulator<C>, C>) -> bool,
    ) -> RunnerResult<()> {
        let started = self.clock.now();
        let timeout = SimTime::from(self.timeout);
        loop {
            self.session.tick();
            if done(&self.session) {
                return Ok(());
            }
            if self.session.state() == ConnectionState::Disconnected {
                let reason = self.session.last_error().unwrap_or("link closed");
                return Err(RunnerError::ConnectionFailed(reason.to_string()));
            }
            if self.clock.now().saturating_since(started) >= timeout {
                return Err(RunnerError::Timeout {
                    what,
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            self.clock.pause(self.tick_interval);
        }
    }
}
