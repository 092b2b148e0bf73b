//! The content-state bridge: a pure per-message controller and the async
//! session that feeds it stored state and carries out its writes.

mod controller;
mod session;

pub use controller::{BridgeController, BridgeOutcome, Disposition, ScoreWrite};
pub use session::{BridgeSession, SessionOutcome};
