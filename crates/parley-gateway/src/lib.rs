// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Parley.
//!
//! Exposes the synchronous and queued chat endpoints, conversation history,
//! job status and health, with fixed-window rate limiting on chat routes.

pub mod handlers;
pub mod rate_limit;
pub mod server;

pub use rate_limit::{Admission, MemoryCounterStore, RateLimiter};
pub use server::{GatewayState, build_router, start_server};
