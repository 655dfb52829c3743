// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat orchestration for the Parley service.
//!
//! - [`ChatOrchestrator`] handles one inbound message end to end: validation,
//!   conversation bookkeeping, job submission, and the synchronous wait.
//! - [`ChatJobHandler`] is what workers run for each job attempt: context
//!   lookup, prompt assembly, the provider call, and reply post-processing.
//! - [`PromptBuilder`] turns history and context into provider messages.

pub mod handler;
pub mod orchestrator;
pub mod prompt;

pub use handler::ChatJobHandler;
pub use orchestrator::{AcceptedJob, ChatOrchestrator, ChatOutcome};
pub use prompt::PromptBuilder;
