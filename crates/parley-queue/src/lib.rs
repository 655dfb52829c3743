// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous job processing for the Parley chat service.
//!
//! A chat turn becomes a durable job: the [`JobQueue`] records it, the
//! [`WorkerPool`] drains ready jobs under a concurrency cap and an
//! independent throughput cap, and [`wait_for`] turns a submitted job back
//! into a blocking call with a hard timeout for synchronous callers.

pub mod queue;
pub mod retry;
pub mod throttle;
pub mod wait;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use queue::JobQueue;
pub use retry::RetryPolicy;
pub use throttle::StartThrottle;
pub use wait::{WaitOptions, wait_for};
pub use worker::{JobHandler, WorkerPool, WorkerPoolConfig};
