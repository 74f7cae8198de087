//! Signal generation — portfolio-agnostic market timing.
//!
//! Signals depend only on closing prices, never on positions or capital.
//! They say "what do I want?", not "what do I have?".

pub mod crossover;
pub mod intent;

pub use crossover::{generate_signals, CrossoverSignal, SignalPoint};
pub use intent::{Signal, Transition};
