//! Shared types, adapter traits, and core utilities for the domain settings registry.
//!
//! This crate contains the foundational types that are shared between the
//! core crate, the server binary and the directory adapter implementations.

pub mod directory_adapter;
pub mod error;
pub mod permissions;
pub mod prelude;
pub mod types;

// vim: ts=4
