//! End-to-end tests for the configuration HTTP API.
//!
//! Each test builds its own harness, so tests are independent and can run in
//! parallel.

pub mod control_tests;
pub mod gpio_tests;
pub mod network_tests;
pub mod restart_tests;
