//! claimflow-core - validation, flow and mapping for the claim lead pipeline
//!
//! Pure building blocks shared by the claimflow server and CLI: per-step
//! validation contracts with stable error keys, the multi-step flow state
//! machine (including the hidden continuation that finishes a submission),
//! address lookup policy, and the CRM payload mapper. No I/O happens here;
//! everything is deterministic and clock-injected for testability.

pub mod dates;
pub mod error;
pub mod flow;
pub mod lookup;
pub mod mapper;
pub mod messages;
pub mod schema;
pub mod signature;
pub mod steps;
pub mod user_agent;

pub use error::{ErrorKind, FieldError, FieldPath, Violation};
pub use flow::{Command, FlowMachine, Outcome, Progress, UiStatus};
pub use lookup::Address;
pub use schema::{schema_for_step, StepSchema};
pub use steps::{StepId, StoragePath};
