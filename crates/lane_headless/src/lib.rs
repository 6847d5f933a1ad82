//! Headless lane battle runner for scripted play and CI verification.
//!
//! A match can be controlled via JSON requests on stdin, with responses on
//! stdout. This enables:
//!
//! - **Scripted play**: An external controller issues player orders tick by tick
//! - **CI verification**: Repeated runs and mid-match copies must hash identically
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Requests from the controller (tick, query, command, ...)
//! - **stdout**: Responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full request/response format.
//!
//! # Example
//!
//! ```bash
//! echo '{"cmd":"tick","count":500}' | cargo run -p lane_headless
//! ```

pub mod error;
pub mod protocol;
pub mod runner;

pub use error::{load_config, HeadlessError};
pub use protocol::{Action, Request, Response};
pub use runner::{run_match, verify, HeadlessRunner, MatchSummary, VerifyReport};
