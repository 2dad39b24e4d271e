//! Application-level orchestration utilities.
//!
//! This module owns the submission lifecycle (validate, issue, resolve) and
//! post-submission processing such as rendering and image export. UI/CLI layers
//! call into this module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{execute, Resolution, SubmissionController, ABANDONED};
pub(crate) use post_process::process_result;
