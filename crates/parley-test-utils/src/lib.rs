// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! # Components
//!
//! - [`MockProvider`] - scripted provider with call counting and optional delay
//! - [`UnavailableStore`] - message store that fails every call
//! - [`TestHarness`] - the full pipeline over a temp database

pub mod harness;
pub mod mock_provider;
pub mod unavailable_store;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::MockProvider;
pub use unavailable_store::UnavailableStore;
