//! Shared building blocks for the employee workspace services.
//!
//! Everything here is free of I/O except tracing initialisation: the employee
//! record, the identity naming rule shared by cluster resources and DNS, and
//! the group permission matrix.

pub mod employee;
pub mod error;
pub mod naming;
pub mod permissions;
pub mod tracing_init;

pub use employee::Employee;
pub use error::{CoreError, Result};
pub use permissions::{Action, PermissionMatrix, PermissionSet, Resource};
