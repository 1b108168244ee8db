//! Integration tests for pulse-app.
//!
//! These tests run the whole application against local collaborators:
//! - Mock WebSocket tick server
//! - In-memory instrument source

pub mod common;
