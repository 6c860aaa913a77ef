//! Option Payoff Functions
//!
//! # Mathematical Definitions
//!
//! Payoffs act on a single functional value `Y` (terminal price, running
//! average or running maximum at a maturity) and a level `m` quoted as a
//! multiple of the initial price `x0`:
//!
//! - **Vanilla**: `max(Y - m·x0, 0)`. Applied to the running average this is
//!   an Asian call, to the running maximum a fixed-strike lookback call.
//! - **Digital barrier**: `1{Y < m·x0}`. Applied to the running maximum this
//!   pays one unit if the path never reached the barrier (up-and-out digital).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payoff {
    /// `max(Y - m·x0, 0)`
    Vanilla,
    /// `1{Y < m·x0}`
    DigitalBarrier,
}

impl Payoff {
    /// Payoff of functional value `value` at level `level` (moneyness or barrier)
    #[inline]
    pub fn calculate(&self, value: f64, level: f64, x0: f64) -> f64 {
        let threshold = level * x0;
        match self {
            Payoff::Vanilla => (value - threshold).max(0.0),
            Payoff::DigitalBarrier => {
                if value < threshold {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}
