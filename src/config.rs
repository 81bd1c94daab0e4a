//! Host behaviour configuration.

use std::time::Duration;

use crate::queue::DEFAULT_PROTOCOL_TIMEOUT;

/// Default number of emulated drives reported to the MSX.
pub const DEFAULT_DRIVES: u8 = 1;

/// What to do when the MSX sends a known command the host does not implement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnimplementedPolicy {
    /// End the session with [`Error::UnimplementedOpcode`](crate::Error::UnimplementedOpcode).
    #[default]
    Abort,
    /// Log the request and send no response.
    Ignore,
}

/// Configuration for a Nowind host session.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Window for an expected byte to arrive.
    pub protocol_timeout: Duration,
    /// Number of drives reported by `DRIVES`.
    pub drives: u8,
    /// Ask the MSX to create phantom drives.
    pub phantom_drives: bool,
    /// Let disk ROMs in other slots initialize as well.
    pub allow_other_diskroms: bool,
    /// Offer MSX-DOS 2 to MSX2 machines.
    pub dos2: bool,
    /// Handling of known but unimplemented commands.
    pub unimplemented_policy: UnimplementedPolicy,
    /// Upper bound on retransmitted blocks per transfer; `None` retries forever.
    pub max_retransmissions: Option<u32>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            protocol_timeout: DEFAULT_PROTOCOL_TIMEOUT,
            drives: DEFAULT_DRIVES,
            phantom_drives: false,
            allow_other_diskroms: true,
            dos2: false,
            unimplemented_policy: UnimplementedPolicy::Abort,
            max_retransmissions: None,
        }
    }
}

impl HostConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protocol timeout.
    #[must_use]
    pub const fn protocol_timeout(mut self, timeout: Duration) -> Self {
        self.protocol_timeout = timeout;
        self
    }

    /// Sets the number of drives.
    #[must_use]
    pub const fn drives(mut self, drives: u8) -> Self {
        self.drives = drives;
        self
    }

    /// Enables or disables phantom drives.
    #[must_use]
    pub const fn phantom_drives(mut self, enabled: bool) -> Self {
        self.phantom_drives = enabled;
        self
    }

    /// Allows or blocks other disk ROMs.
    #[must_use]
    pub const fn allow_other_diskroms(mut self, allowed: bool) -> Self {
        self.allow_other_diskroms = allowed;
        self
    }

    /// Enables or disables MSX-DOS 2.
    #[must_use]
    pub const fn dos2(mut self, enabled: bool) -> Self {
        self.dos2 = enabled;
        self
    }

    /// Sets the unimplemented-command policy.
    #[must_use]
    pub const fn unimplemented_policy(mut self, policy: UnimplementedPolicy) -> Self {
        self.unimplemented_policy = policy;
        self
    }

    /// Bounds retransmissions per transfer.
    #[must_use]
    pub const fn max_retransmissions(mut self, limit: Option<u32>) -> Self {
        self.max_retransmissions = limit;
        self
    }
}
