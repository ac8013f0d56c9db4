use std::thread;
use std::time::Duration;

use crate::cloud::{AgentApi, IdentityApi};

/// Timing knobs for polling and for spacing out per-user calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    pub poll_interval: Duration,
    pub deletion_timeout: Duration,
    pub throttle: Duration,
}

impl Pacing {
    /// No sleeping at all, with a generous deadline. Used against the
    /// in-memory tenancy.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            deletion_timeout: Duration::from_secs(60),
            throttle: Duration::ZERO,
        }
    }

    pub fn pause(&self) {
        if !self.throttle.is_zero() {
            thread::sleep(self.throttle);
        }
    }
}

/// Everything a lab procedure needs: both service clients, the tenancy root
/// and pacing.
pub struct LabContext<'a> {
    pub identity: &'a dyn IdentityApi,
    pub agents: &'a dyn AgentApi,
    pub tenancy_id: String,
    pub pacing: Pacing,
}

impl<'a> LabContext<'a> {
    pub fn new(
        identity: &'a dyn IdentityApi,
        agents: &'a dyn AgentApi,
        tenancy_id: impl Into<String>,
        pacing: Pacing,
    ) -> Self {
        Self {
            identity,
            agents,
            tenancy_id: tenancy_id.into(),
            pacing,
        }
    }
}
