//! m2ha - MIDI to Home Assistant bridge
//!
//! Reads a class-compliant MIDI control surface, maps faders, knobs and
//! buttons to Home Assistant service calls, and forwards them through a
//! coalescing, rate-limited dispatcher.

pub mod config;
pub mod control_mapping;
pub mod dispatcher;
pub mod drivers;
pub mod entities;
pub mod gateway;
pub mod interpreter;
pub mod midi;
pub mod surface;

pub use dispatcher::{Dispatcher, TickOutcome};
pub use gateway::Gateway;
pub use interpreter::{Command, Interpreter, ShiftState};
pub use midi::RawEvent;
