//! Permission system types and utilities.
//!
//! Roles hold a bitmask of [`Permission`] flags. Every account gets one role
//! at creation: the administrator role for the configured admin email, the
//! default role for everyone else.

pub mod bootstrap;
pub mod flags;
pub mod resolver;
pub mod role;

pub use bootstrap::{set_roles, BootstrapError, RoleTable, DEFAULT_ROLE};
pub use flags::Permission;
pub use resolver::{assign_role, RoleResolver, StoreRoleResolver};
pub use role::{Role, RoleId, ADMINISTRATOR_ROLE};
