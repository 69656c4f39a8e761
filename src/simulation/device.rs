//! A single simulated device: its tables, inbox and outgoing queue.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Device, DeviceKind, Interface, RoutingProtocol};
use crate::utils::subnet_of;

use super::types::{
    DeviceCounters, DeviceState, Message, Payload, RouteAdvert, INFINITE_METRIC,
};

/// One side of a topology link, seen from the local device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub local_interface: Option<String>,
    pub peer: String,
    pub peer_interface: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NeighborKind {
    Ospf { process_id: u32 },
    Bgp { as_number: u32 },
    General { kind: DeviceKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub kind: NeighborKind,
    pub last_seen_tick: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub metric: u32,
    /// `None` for directly connected networks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<Ipv4Addr>,
}

/// Outgoing message queued on a port until the engine delivers it
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub port: usize,
    pub message: Message,
}

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub interfaces: Vec<Interface>,
    pub protocols: Vec<RoutingProtocol>,
    pub ports: Vec<Port>,
    pub neighbors: BTreeMap<String, NeighborEntry>,
    pub routing_table: BTreeMap<Ipv4Network, Route>,
    /// Learned address -> owning device
    pub arp_table: BTreeMap<Ipv4Addr, String>,
    pub state: DeviceState,
    pub counters: DeviceCounters,
    pub(crate) inbox: Vec<Message>,
    pub(crate) outbox: Vec<Outgoing>,
}

impl SimDevice {
    pub fn new(device: &Device, ports: Vec<Port>) -> Self {
        let mut sim = Self {
            name: device.hostname.clone(),
            kind: device.kind,
            interfaces: device.interfaces.clone(),
            protocols: device.routing_protocols.clone(),
            ports,
            neighbors: BTreeMap::new(),
            routing_table: BTreeMap::new(),
            arp_table: BTreeMap::new(),
            state: DeviceState::Running,
            counters: DeviceCounters::default(),
            inbox: Vec::new(),
            outbox: Vec::new(),
        };
        sim.install_connected_routes();
        sim
    }

    pub fn is_running(&self) -> bool {
        self.state == DeviceState::Running
    }

    /// Whether the named local interface is administratively up.
    ///
    /// Ports without a known local interface are always up.
    pub fn interface_up(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self
                .interfaces
                .iter()
                .find(|i| i.name == name)
                .map_or(true, Interface::is_up),
            None => true,
        }
    }

    fn install_connected_routes(&mut self) {
        for iface in self.interfaces.iter().filter(|i| i.is_up()) {
            if let Some(address) = iface.address {
                self.routing_table.insert(
                    subnet_of(&address),
                    Route {
                        metric: 0,
                        next_hop: None,
                    },
                );
            }
        }
    }

    /// Take an interface down and withdraw its connected route
    pub fn shut_interface(&mut self, name: &str) -> bool {
        let Some(iface) = self.interfaces.iter_mut().find(|i| i.name == name) else {
            return false;
        };
        iface.admin_state = crate::model::AdminState::Down;
        if let Some(address) = iface.address {
            let network = subnet_of(&address);
            if self.routing_table.get(&network).is_some_and(|r| r.metric == 0) {
                self.routing_table.remove(&network);
            }
        }
        true
    }

    pub fn fail(&mut self) {
        self.state = DeviceState::Failed;
        self.inbox.clear();
        self.outbox.clear();
    }

    fn send_on(&mut self, port: usize, tick: u64, payload: Payload) {
        self.outbox.push(Outgoing {
            port,
            message: Message {
                source: self.name.clone(),
                sent_tick: tick,
                payload,
            },
        });
    }

    /// Queue a copy of `payload` on every port
    fn broadcast(&mut self, tick: u64, payload: Payload) {
        for port in 0..self.ports.len() {
            self.send_on(port, tick, payload.clone());
        }
    }

    /// Day-1 bring-up: ARP, routing protocol hellos, neighbour discovery
    pub fn day1(&mut self, tick: u64) {
        debug!("{} performing Day-1 initialization", self.name);

        let announcements: Vec<Payload> = self
            .interfaces
            .iter()
            .filter(|i| i.is_up())
            .filter_map(|i| {
                i.ip().map(|ip| Payload::ArpAnnouncement {
                    interface: i.name.clone(),
                    ip,
                })
            })
            .collect();
        // ARP stays on the segment of the announcing interface
        for payload in announcements {
            let Payload::ArpAnnouncement { interface, .. } = &payload else {
                continue;
            };
            let ports: Vec<usize> = self
                .ports
                .iter()
                .enumerate()
                .filter(|(_, p)| p.local_interface.as_deref().map_or(true, |l| l == interface.as_str()))
                .map(|(n, _)| n)
                .collect();
            for port in ports {
                self.send_on(port, tick, payload.clone());
            }
        }

        let hellos: Vec<Payload> = self
            .protocols
            .iter()
            .filter_map(|p| match p {
                RoutingProtocol::Ospf { process_id, .. } => Some(Payload::OspfHello {
                    process_id: *process_id,
                }),
                RoutingProtocol::Bgp { as_number, .. } => Some(Payload::BgpOpen {
                    as_number: *as_number,
                }),
                _ => None,
            })
            .collect();
        for payload in hellos {
            self.broadcast(tick, payload);
        }

        self.broadcast(tick, Payload::NeighborDiscovery { kind: self.kind });
    }

    /// Advertise the routing table to every port
    pub fn send_routing_update(&mut self, tick: u64) {
        let routes: Vec<RouteAdvert> = self
            .routing_table
            .iter()
            .map(|(network, route)| RouteAdvert {
                network: *network,
                metric: route.metric,
            })
            .collect();
        self.broadcast(tick, Payload::RoutingUpdate { routes });
    }

    /// Handle every queued message
    pub fn process_inbox(&mut self, tick: u64) {
        let inbox = std::mem::take(&mut self.inbox);
        for message in inbox {
            self.counters.packets_received += 1;
            self.handle(tick, message);
        }
    }

    fn handle(&mut self, tick: u64, message: Message) {
        if message.source == self.name {
            return;
        }
        match message.payload {
            Payload::ArpAnnouncement { ip, .. } => {
                self.arp_table.insert(ip, message.source);
            }
            Payload::OspfHello { process_id } => {
                self.learn_neighbor(message.source, NeighborKind::Ospf { process_id }, tick);
            }
            Payload::BgpOpen { as_number } => {
                self.learn_neighbor(message.source, NeighborKind::Bgp { as_number }, tick);
            }
            Payload::NeighborDiscovery { kind } => {
                // Routing adjacencies carry more detail than plain discovery
                match self.neighbors.get_mut(&message.source) {
                    Some(entry) => entry.last_seen_tick = tick,
                    None => {
                        self.learn_neighbor(message.source, NeighborKind::General { kind }, tick)
                    }
                }
            }
            Payload::RoutingUpdate { routes } => {
                let next_hop = self
                    .arp_table
                    .iter()
                    .find(|(_, owner)| **owner == message.source)
                    .map(|(ip, _)| *ip);
                if let Some(entry) = self.neighbors.get_mut(&message.source) {
                    entry.last_seen_tick = tick;
                }
                for advert in routes {
                    self.learn_route(advert, next_hop);
                }
            }
        }
    }

    fn learn_neighbor(&mut self, source: String, kind: NeighborKind, tick: u64) {
        debug!("{} learned neighbor {} ({:?})", self.name, source, kind);
        self.neighbors.insert(
            source,
            NeighborEntry {
                kind,
                last_seen_tick: tick,
            },
        );
    }

    fn learn_route(&mut self, advert: RouteAdvert, next_hop: Option<Ipv4Addr>) {
        let metric = advert.metric.saturating_add(1);
        if metric >= INFINITE_METRIC {
            return;
        }
        let better = self
            .routing_table
            .get(&advert.network)
            .map_or(true, |current| metric < current.metric);
        if better {
            self.routing_table
                .insert(advert.network, Route { metric, next_hop });
        }
    }
}
