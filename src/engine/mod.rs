//! Continuation Engine Module
//!
//! Drives workflow instances forward one activity at a time.
//!
//! - [`continuation`]: The engine and its stage advancement rules
//! - [`locks`]: Per-workflow mutual exclusion
//! - [`response`]: Outcomes and the `ContinueWorkflow` wire envelope

pub mod continuation;
pub mod locks;
pub mod response;

pub use continuation::ContinuationEngine;
pub use locks::{WorkflowGuard, WorkflowLocks};
pub use response::{
    ContinuationOutcome, ContinueWorkflowRequest, ContinueWorkflowResponse, ErrorBody,
    LaunchOutcome, StageSnapshot, WorkflowSnapshot,
};
