//! Routing and decision core for a multi-stage loan application workflow.
//!
//! The crate owns the deterministic layer of the system: the state-aware gate
//! that selects which specialist module handles the next conversational turn,
//! the verification engine that reconciles declared data against the
//! applicant's historical record, and the hybrid decision engine that combines
//! hard financial math with a post-hoc safety override. Language-model
//! collaborators (field extraction, qualitative recommendations, semantic
//! field equivalence) sit behind trait seams and are stubbed in tests.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
