//! Protocol types, identifiers, and playback value objects (no I/O).

pub mod event;
pub mod identity;
pub mod playback;
pub mod room;
