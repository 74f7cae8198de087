//! Signal and transition values — what the crossover wants, bar by bar.

use serde::{Deserialize, Serialize};

/// Desired exposure at a bar: flat (0) or long (1).
///
/// Signals are portfolio-agnostic; whether a position actually exists is the
/// simulator's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    #[default]
    Flat,
    Long,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Signal::Flat => 0,
            Signal::Long => 1,
        }
    }

    pub fn is_long(self) -> bool {
        matches!(self, Signal::Long)
    }
}

/// Change in signal from the previous bar: `signal[i] - signal[i-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// -1: long → flat.
    Exit,
    /// 0: no change.
    #[default]
    Hold,
    /// +1: flat → long.
    Enter,
}

impl Transition {
    pub fn between(previous: Signal, current: Signal) -> Self {
        match current.value() - previous.value() {
            1 => Transition::Enter,
            -1 => Transition::Exit,
            _ => Transition::Hold,
        }
    }

    pub fn value(self) -> i8 {
        match self {
            Transition::Exit => -1,
            Transition::Hold => 0,
            Transition::Enter => 1,
        }
    }
}
