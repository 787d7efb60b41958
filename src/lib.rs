//! Simulated congestion control with adaptive algorithm switching.
//!
//! Four window/model based algorithms (Tahoe, Reno, Cubic and BBR) are driven
//! by caller supplied acknowledgment, loss and RTT samples. An
//! [AdaptiveController] classifies the path and hot-swaps the active algorithm,
//! and a [SessionRegistry] keeps one controller per client session.

mod adaptive_controller;
mod clock;
mod config;
mod error;
mod network_condition;
mod performance;
mod sample_history;
mod session_registry;

pub mod algorithm;
pub mod units;

pub use adaptive_controller::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use network_condition::*;
pub use performance::*;
pub use sample_history::*;
pub use session_registry::*;
