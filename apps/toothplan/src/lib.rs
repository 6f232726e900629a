//! # Toothplan CLI Library
//!
//! Library interface for the toothplan binary.
//! Exposes the CLI and config modules for integration testing.

pub mod cli;
pub mod config;
