//! Tick-based simulation engine.
//!
//! Each tick runs in two phases. First every running device drains its
//! inbox and queues outgoing messages; devices are independent during this
//! phase and are processed in parallel. Then the engine delivers queued
//! messages in hostname order, applying interface state and random loss.

use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::model::Inventory;
use crate::settings::SimulationSettings;
use crate::topology::Topology;

use super::device::{Outgoing, Port, SimDevice};
use super::types::{
    DeviceCounters, DeviceState, DeviceStatistics, Fault, SimulationError, SimulationStatistics,
};

pub struct Simulator {
    devices: BTreeMap<String, SimDevice>,
    settings: SimulationSettings,
    rng: StdRng,
    tick: u64,
    running: bool,
    paused: bool,
}

impl Simulator {
    /// Create one simulated device per inventory device, wired by topology links
    pub fn load(inventory: &Inventory, topology: &Topology, settings: &SimulationSettings) -> Self {
        info!("Loading topology into simulator...");

        let mut ports: BTreeMap<&str, Vec<Port>> = BTreeMap::new();
        for link in &topology.links {
            ports.entry(&link.a.device).or_default().push(Port {
                local_interface: link.a.interface.clone(),
                peer: link.b.device.clone(),
                peer_interface: link.b.interface.clone(),
            });
            ports.entry(&link.b.device).or_default().push(Port {
                local_interface: link.b.interface.clone(),
                peer: link.a.device.clone(),
                peer_interface: link.a.interface.clone(),
            });
        }

        let devices: BTreeMap<String, SimDevice> = inventory
            .devices
            .values()
            .map(|device| {
                let device_ports = ports.remove(device.hostname.as_str()).unwrap_or_default();
                (device.hostname.clone(), SimDevice::new(device, device_ports))
            })
            .collect();

        info!("Loaded {} devices", devices.len());
        Self {
            devices,
            settings: settings.clone(),
            rng: StdRng::seed_from_u64(settings.seed),
            tick: 0,
            running: false,
            paused: false,
        }
    }

    pub fn device(&self, name: &str) -> Option<&SimDevice> {
        self.devices.get(name)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn start(&mut self) {
        if self.running {
            warn!("Simulation already running");
            return;
        }
        info!("Starting network simulation...");
        self.running = true;
        for device in self.devices.values_mut() {
            if device.state == DeviceState::Stopped {
                device.state = DeviceState::Running;
            }
        }
    }

    pub fn pause(&mut self) {
        info!("Pausing simulation...");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        info!("Resuming simulation...");
        self.paused = false;
    }

    pub fn stop(&mut self) {
        info!("Stopping simulation...");
        self.running = false;
        for device in self.devices.values_mut() {
            if device.state == DeviceState::Running {
                device.state = DeviceState::Stopped;
            }
        }
    }

    pub fn inject_fault(&mut self, device: &str, fault: &Fault) -> Result<(), SimulationError> {
        let target = self
            .devices
            .get_mut(device)
            .ok_or_else(|| SimulationError::UnknownDevice(device.to_string()))?;

        info!("Injecting fault '{}' on {}", fault, device);
        match fault {
            Fault::InterfaceDown(iface) => {
                if !target.shut_interface(iface) {
                    return Err(SimulationError::UnknownInterface {
                        device: device.to_string(),
                        interface: iface.clone(),
                    });
                }
                info!("{} interface {} is now down", device, iface);
            }
            Fault::DeviceFailure => {
                target.fail();
                info!("{} device failed", device);
            }
        }
        Ok(())
    }

    /// Advance one tick. Does nothing while stopped or paused.
    pub fn step(&mut self) {
        if !self.running || self.paused {
            return;
        }
        let tick = self.tick;
        let update_every = self.settings.update_every_ticks();

        self.devices.par_iter_mut().for_each(|(_, device)| {
            if !device.is_running() {
                return;
            }
            if tick == 0 {
                device.day1(tick);
            }
            device.process_inbox(tick);
            if tick % update_every == 0 {
                device.send_routing_update(tick);
            }
            device.counters.uptime_ticks += 1;
        });

        self.deliver();
        self.tick += 1;
    }

    /// Run `ticks` steps, starting the simulation if needed
    pub fn run_for_ticks(&mut self, ticks: u64) {
        if !self.running {
            self.start();
        }
        for _ in 0..ticks {
            self.step();
        }
        debug!("Simulation advanced to tick {}", self.tick);
    }

    /// Run for the configured duration
    pub fn run(&mut self) {
        self.run_for_ticks(self.settings.total_ticks());
    }

    fn deliver(&mut self) {
        let names: Vec<String> = self.devices.keys().cloned().collect();
        for name in names {
            let Some(sender) = self.devices.get_mut(&name) else {
                continue;
            };
            let outbox: Vec<Outgoing> = std::mem::take(&mut sender.outbox);
            let ports = sender.ports.clone();

            for outgoing in outbox {
                let Some(port) = ports.get(outgoing.port) else {
                    continue;
                };
                let local_up = self
                    .devices
                    .get(&name)
                    .is_some_and(|d| d.interface_up(port.local_interface.as_deref()));
                if !local_up {
                    self.count(&name, |c| c.errors += 1);
                    continue;
                }
                self.count(&name, |c| c.packets_sent += 1);

                let lost = self.settings.loss_rate > 0.0 && self.rng.gen_bool(self.settings.loss_rate);
                let deliverable = self.devices.get(&port.peer).is_some_and(|peer| {
                    peer.is_running() && peer.interface_up(port.peer_interface.as_deref())
                });
                if lost || !deliverable {
                    self.count(&name, |c| c.packets_dropped += 1);
                    continue;
                }

                debug!("{} -> {}: {}", name, port.peer, outgoing.message.payload.name());
                if let Some(peer) = self.devices.get_mut(&port.peer) {
                    peer.inbox.push(outgoing.message);
                }
            }
        }
    }

    fn count(&mut self, device: &str, update: impl FnOnce(&mut DeviceCounters)) {
        if let Some(d) = self.devices.get_mut(device) {
            update(&mut d.counters);
        }
    }

    pub fn statistics(&self) -> SimulationStatistics {
        let device_statistics = self
            .devices
            .iter()
            .map(|(name, device)| {
                (
                    name.clone(),
                    DeviceStatistics {
                        name: name.clone(),
                        kind: device.kind,
                        state: device.state,
                        stats: device.counters.clone(),
                        uptime: ticks_to_duration(self.settings.tick, device.counters.uptime_ticks),
                        neighbors: device.neighbors.len(),
                        routing_entries: device.routing_table.len(),
                        arp_entries: device.arp_table.len(),
                    },
                )
            })
            .collect();

        SimulationStatistics {
            simulation_running: self.running,
            simulation_paused: self.paused,
            ticks: self.tick,
            elapsed: ticks_to_duration(self.settings.tick, self.tick),
            total_devices: self.devices.len(),
            device_statistics,
        }
    }
}

/// Simulated time for `ticks` ticks, saturating at `u64::MAX` nanoseconds
fn ticks_to_duration(tick: Duration, ticks: u64) -> Duration {
    let nanos = tick.as_nanos().saturating_mul(u128::from(ticks));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_device;
    use crate::settings::TopologySettings;
    use crate::topology::build_topology;
    use std::net::Ipv4Addr;

    // R1 -- R2 -- R3 chain over two /30s, R1 also has a LAN
    fn chain() -> (Inventory, Topology) {
        let mut inventory = Inventory::default();
        for (name, text) in [
            (
                "R1",
                "hostname R1\ninterface Gi0/0\n ip address 10.0.12.1 255.255.255.252\ninterface Gi0/1\n ip address 192.168.1.1 255.255.255.0\nrouter ospf 1\n network 10.0.12.0 0.0.0.3 area 0\n",
            ),
            (
                "R2",
                "hostname R2\ninterface Gi0/0\n ip address 10.0.12.2 255.255.255.252\ninterface Gi0/1\n ip address 10.0.23.1 255.255.255.252\nrouter ospf 1\n network 10.0.0.0 0.0.255.255 area 0\n",
            ),
            (
                "R3",
                "hostname R3\ninterface Gi0/0\n ip address 10.0.23.2 255.255.255.252\n",
            ),
        ] {
            let device = parse_device(name, text);
            inventory.devices.insert(device.hostname.clone(), device);
        }
        let topology = build_topology(&inventory, &TopologySettings::default());
        (inventory, topology)
    }

    fn settings() -> SimulationSettings {
        SimulationSettings {
            tick: Duration::from_millis(100),
            update_interval: Duration::from_millis(200),
            duration: Duration::from_secs(1),
            loss_rate: 0.0,
            seed: 7,
        }
    }

    #[test]
    fn test_day1_discovers_neighbors() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.run_for_ticks(2);

        let r2 = sim.device("R2").unwrap();
        assert_eq!(r2.neighbors.len(), 2);
        assert_eq!(r2.arp_table.len(), 2);
        assert!(sim.device("R1").unwrap().neighbors.contains_key("R2"));
    }

    #[test]
    fn test_routes_propagate_across_chain() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.run();

        let r3 = sim.device("R3").unwrap();
        let lan: ipnetwork::Ipv4Network = "192.168.1.0/24".parse().unwrap();
        assert_eq!(r3.routing_table[&lan].metric, 2);
        assert_eq!(
            r3.routing_table[&lan].next_hop,
            Some("10.0.23.1".parse::<Ipv4Addr>().unwrap())
        );

        let stats = sim.statistics();
        assert_eq!(stats.ticks, 10);
        assert_eq!(stats.elapsed, Duration::from_secs(1));
        assert_eq!(stats.device_statistics["R3"].routing_entries, 3);
    }

    #[test]
    fn test_pause_and_stop() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.start();
        sim.step();
        sim.pause();
        sim.step();
        assert_eq!(sim.ticks(), 1);
        sim.resume();
        sim.step();
        assert_eq!(sim.ticks(), 2);

        sim.stop();
        sim.step();
        assert_eq!(sim.ticks(), 2);
        let stats = sim.statistics();
        assert!(!stats.simulation_running);
        assert_eq!(stats.device_statistics["R1"].state, DeviceState::Stopped);
    }

    #[test]
    fn test_restart_after_stop() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.inject_fault("R3", &Fault::DeviceFailure).unwrap();
        sim.run_for_ticks(2);
        sim.stop();

        sim.start();
        sim.step();
        assert_eq!(sim.ticks(), 3);
        let stats = sim.statistics();
        assert_eq!(stats.device_statistics["R1"].state, DeviceState::Running);
        assert_eq!(stats.device_statistics["R3"].state, DeviceState::Failed);
        assert_eq!(stats.device_statistics["R1"].stats.uptime_ticks, 3);
        assert_eq!(stats.elapsed, Duration::from_millis(300));
    }

    #[test]
    fn test_elapsed_time_saturates() {
        assert_eq!(
            ticks_to_duration(Duration::from_millis(100), 25),
            Duration::from_millis(2500)
        );
        assert_eq!(
            ticks_to_duration(Duration::from_secs(1), u64::MAX),
            Duration::from_nanos(u64::MAX)
        );
    }

    #[test]
    fn test_device_failure_isolates_device() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.inject_fault("R2", &Fault::DeviceFailure).unwrap();
        sim.run_for_ticks(5);

        assert!(sim.device("R1").unwrap().neighbors.is_empty());
        let stats = sim.statistics();
        assert_eq!(stats.device_statistics["R2"].state, DeviceState::Failed);
        assert_eq!(stats.device_statistics["R2"].stats.packets_sent, 0);
        assert!(stats.device_statistics["R1"].stats.packets_dropped > 0);
    }

    #[test]
    fn test_interface_down_counts_errors() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        sim.inject_fault("R3", &Fault::InterfaceDown("Gi0/0".to_string()))
            .unwrap();
        sim.run_for_ticks(3);

        let r3 = &sim.statistics().device_statistics["R3"];
        assert!(r3.stats.errors > 0);
        assert_eq!(r3.neighbors, 0);
        assert!(!sim.device("R2").unwrap().neighbors.contains_key("R3"));
    }

    #[test]
    fn test_unknown_targets_rejected() {
        let (inventory, topology) = chain();
        let mut sim = Simulator::load(&inventory, &topology, &settings());
        assert!(matches!(
            sim.inject_fault("R9", &Fault::DeviceFailure),
            Err(SimulationError::UnknownDevice(_))
        ));
        assert!(matches!(
            sim.inject_fault("R1", &Fault::InterfaceDown("Gi7/7".to_string())),
            Err(SimulationError::UnknownInterface { .. })
        ));
    }

    #[test]
    fn test_full_loss_delivers_nothing() {
        let (inventory, topology) = chain();
        let mut lossy = settings();
        lossy.loss_rate = 1.0;
        let mut sim = Simulator::load(&inventory, &topology, &lossy);
        sim.run_for_ticks(4);
        let stats = sim.statistics();
        for device in stats.device_statistics.values() {
            assert_eq!(device.stats.packets_received, 0);
            assert_eq!(device.neighbors, 0);
        }
    }
}
