//! Inkwell Server
//!
//! Accounts, roles and signed-link tokens for the Inkwell blogging platform.

pub mod auth;
pub mod config;
pub mod db;
pub mod permissions;
pub mod util;
