//! The turn loop: the heart of Joi.
//!
//! One user turn follows a **respond → extract → execute** cycle:
//!
//! 1. **Respond**: the session's model streams a reply over the full history
//! 2. **Extract**: `TOOL_CALL::` lines are pulled out of the reply
//! 3. **Execute**: each call runs in order and its result joins the history
//!
//! The cycle repeats until a reply carries no calls or the round bound is
//! reached. Progress is reported as [`TurnEvent`]s.

pub mod event;
pub mod runner;

#[cfg(test)]
mod test_helpers;

pub use event::{ToolResultPayload, TurnEvent};
pub use runner::{DEFAULT_MAX_ROUNDS, TurnOutcome, TurnRunner, TurnStatus};
