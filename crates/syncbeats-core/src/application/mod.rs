pub mod ports;

pub mod drift;
pub mod host_gate;
pub mod join_room;
pub mod manage_queue;
pub mod queue;
pub mod session;
pub mod suppressor;
pub mod sync_engine;

#[cfg(test)]
pub(crate) mod testing;
