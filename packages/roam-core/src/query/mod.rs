//! The query output surface: the envelope every command wraps its
//! result in, and the SARIF 2.1.0 alternative for rule/gate commands.
//! The ~130 thin query commands that build specific envelopes are out
//! of scope; this module is the shared protocol layer they'd all sit
//! on top of.

pub mod envelope;
pub mod sarif;
