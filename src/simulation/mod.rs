//! Tick-based neighbour discovery and routing simulation.
//!
//! Devices bring up their interfaces on the first tick (ARP, routing
//! protocol hellos, neighbour discovery) and then exchange distance-vector
//! routing updates over the inferred topology links.

pub mod device;
pub mod engine;
pub mod types;

pub use device::{NeighborEntry, NeighborKind, Port, Route, SimDevice};
pub use engine::Simulator;
pub use types::{
    DeviceCounters, DeviceState, DeviceStatistics, Fault, FaultSpec, Message, Payload,
    RouteAdvert, SimulationError, SimulationStatistics,
};
