//! Taskboard - command-line client for the Taskboard project-management backend
//!
//! This library provides sign-in to the backend through Google or GitHub,
//! password login, and the session store the rest of the client reads from.

pub mod auth;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
