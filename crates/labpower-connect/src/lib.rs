//! Command transport for labpower
//!
//! Backends never spawn processes on their own. They hand encoded
//! commands to a [`Connection`], which runs them on the managed host
//! (locally, over SSH, through an agent, ...) and returns the raw output.
//!
//! [`LocalConnection`] runs commands on the current machine.

pub mod connection;
pub mod error;
pub mod local;
pub mod types;

pub use connection::Connection;
pub use error::{ConnectionError, Result};
pub use local::LocalConnection;
pub use types::{CompletedProcess, ExecOptions, OsName};
