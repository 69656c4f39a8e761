//! Messages, faults and statistics for the topology simulation.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::model::DeviceKind;

/// Distance-vector metric treated as unreachable
pub const INFINITE_METRIC: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Device {0} not found in simulation")]
    UnknownDevice(String),
    #[error("Interface {interface} not found on device {device}")]
    UnknownInterface { device: String, interface: String },
    #[error("Invalid fault specification '{0}': expected DEVICE:interface_down:IFACE or DEVICE:device_failure")]
    InvalidFault(String),
}

/// One advertised route in a routing update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvert {
    pub network: Ipv4Network,
    pub metric: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    ArpAnnouncement { interface: String, ip: Ipv4Addr },
    OspfHello { process_id: u32 },
    BgpOpen { as_number: u32 },
    NeighborDiscovery { kind: DeviceKind },
    RoutingUpdate { routes: Vec<RouteAdvert> },
}

impl Payload {
    pub fn name(&self) -> &'static str {
        match self {
            Payload::ArpAnnouncement { .. } => "arp_announcement",
            Payload::OspfHello { .. } => "ospf_hello",
            Payload::BgpOpen { .. } => "bgp_open",
            Payload::NeighborDiscovery { .. } => "neighbor_discovery",
            Payload::RoutingUpdate { .. } => "routing_update",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: String,
    pub sent_tick: u64,
    pub payload: Payload,
}

/// A fault that can be injected into a running simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Links on this interface stop carrying traffic
    InterfaceDown(String),
    /// The device stops processing and sending messages
    DeviceFailure,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::InterfaceDown(iface) => write!(f, "interface_down({})", iface),
            Fault::DeviceFailure => write!(f, "device_failure"),
        }
    }
}

/// A fault aimed at a device, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpec {
    pub device: String,
    pub fault: Fault,
}

impl FromStr for FaultSpec {
    type Err = SimulationError;

    /// Parse `DEVICE:interface_down:IFACE` or `DEVICE:device_failure`.
    ///
    /// Interface names may themselves contain `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SimulationError::InvalidFault(s.to_string());
        let mut parts = s.splitn(3, ':');
        let device = parts.next().filter(|d| !d.is_empty()).ok_or_else(invalid)?;
        let fault = match (parts.next(), parts.next()) {
            (Some("device_failure"), None) => Fault::DeviceFailure,
            (Some("interface_down"), Some(iface)) if !iface.is_empty() => {
                Fault::InterfaceDown(iface.to_string())
            }
            _ => return Err(invalid()),
        };
        Ok(FaultSpec {
            device: device.to_string(),
            fault,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Running,
    Failed,
    Stopped,
}

/// Per-device packet counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCounters {
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Lost in transit or undeliverable at the far end
    pub packets_dropped: u64,
    /// Sends attempted over an interface that is down
    pub errors: u64,
    pub uptime_ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatistics {
    pub name: String,
    pub kind: DeviceKind,
    pub state: DeviceState,
    pub stats: DeviceCounters,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
    pub neighbors: usize,
    pub routing_entries: usize,
    pub arp_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStatistics {
    pub simulation_running: bool,
    pub simulation_paused: bool,
    pub ticks: u64,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub total_devices: usize,
    pub device_statistics: BTreeMap<String, DeviceStatistics>,
}
