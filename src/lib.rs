// src/lib.rs

//! Local Debian package installer engine
//!
//! Decides whether a batch of local `.deb` archives can be installed on the
//! running system, what else each one pulls in, and what installing or
//! removing a package would break.
//!
//! # Architecture
//!
//! - `backend`: the system package database (dpkg status + apt lists), loaded in the background
//! - `resolver`: dependency, conflict and reverse-dependency resolution over that database
//! - `manager`: the ordered batch of candidate archives with memoized per-archive status
//! - `installer`: the privileged helper that performs the actual installs
//! - `db`: SQLite cache of the parsed package index

pub mod backend;
pub mod config;
pub mod db;
mod error;
pub mod installer;
pub mod manager;
pub mod packages;
pub mod resolver;
pub mod version;

pub use error::{Error, Result};
