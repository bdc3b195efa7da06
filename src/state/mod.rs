//! State module for tracking document progress
//!
//! # Components
//!
//! - `DocumentStatus` / `ProcessingStage`: the two lifecycle columns persisted per document
//! - `PipelineState`: the in-flight state machine the coordinator drives each document through

mod pipeline_state;
mod status;

pub use pipeline_state::PipelineState;
pub use status::{DocumentStatus, ProcessingStage};
