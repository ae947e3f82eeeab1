//! The closed set of polled networks and the two refresh strategies.

use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// One of the ledger networks the service polls.
///
/// Each carries a WebSocket address and a display name, fixed at compile
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Network {
    XrplMainnet,
    Xahau,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::XrplMainnet, Network::Xahau];

    /// WebSocket endpoint address.
    pub fn ws_url(&self) -> &'static str {
        match self {
            Network::XrplMainnet => "wss://xrpl1.panicbot.app",
            Network::Xahau => "wss://xahau2.panicbot.app",
        }
    }

    /// Name shown to consumers and stored in snapshots.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::XrplMainnet => "XRPL Mainnet",
            Network::Xahau => "Xahau Network",
        }
    }

    /// Short name used in store keys.
    pub fn short_name(&self) -> &'static str {
        match self {
            Network::XrplMainnet => "XRPL",
            Network::Xahau => "Xahau",
        }
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|network| network.display_name() == name)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Refresh strategy for the orchestrator.
///
/// `Live` is driven by server-pushed ledger-closed events and aggregates one
/// ledger per cycle; `Historical100` is driven by a fixed timer and
/// aggregates a window of recent ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RefreshMode {
    Live,
    Historical100,
}

impl RefreshMode {
    /// Size of the ledger index window one fetch cycle covers.
    pub fn ledger_count(&self) -> u32 {
        match self {
            RefreshMode::Live => 1,
            RefreshMode::Historical100 => 100,
        }
    }

    /// Interval between timer-driven refreshes.
    pub fn refresh_interval(&self) -> Duration {
        match self {
            RefreshMode::Live => Duration::from_secs(15),
            RefreshMode::Historical100 => Duration::from_secs(300),
        }
    }

    /// Name used in store keys and the active-selection record.
    pub fn mode_name(&self) -> &'static str {
        match self {
            RefreshMode::Live => "Live",
            RefreshMode::Historical100 => "Last 100",
        }
    }

    pub fn from_mode_name(name: &str) -> Option<Self> {
        [RefreshMode::Live, RefreshMode::Historical100]
            .into_iter()
            .find(|mode| mode.mode_name() == name)
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mode_name())
    }
}
