//! Integration tests for backup-orchestrator
//!
//! These tests require Docker and exercise real dump tools and transfer servers.
//! Run with: `cargo test -p backup-orchestrator-tests --test integration -- --ignored`

mod common;
mod ftp;
mod mysql;
