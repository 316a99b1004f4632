//! Integration test suite for nexusd.
//!
//! These tests run a real server on a loopback port and speak the line
//! protocol over TCP, exercising authentication, request parsing and
//! dispatch together.
//!
//! # Test Categories
//!
//! - `protocol`: wire-level authentication and request parsing
//! - `actions`: dispatch behavior observable without an attached device
//!
//! # CI Compatibility
//!
//! No Android device is attached in CI, so device-bound actions are expected
//! to fail fast with the uniform no-device error. Nothing here requires the
//! platform tools to be installed.

mod fixtures;

mod actions;
mod protocol;
