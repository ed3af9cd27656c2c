//! # Trellis JDBC Server
//!
//! Front controller for database server endpoints. A database client talks
//! to the [`JdbcEndpointAdapterController`] through the [`JdbcController`]
//! operations; the controller keeps connection and transaction state and
//! turns every step that needs an answer into a [`types::Message`] for the
//! delegate [`endpoint::EndpointAdapter`], typically a test case receiving
//! the request through a direct-sync channel.
//!
//! ## Auto handling
//!
//! - `auto_connect`, `auto_create_statement`, `auto_transaction_handling`
//!   answer the matching steps locally
//! - queries fully matching an auto-handle pattern (validation queries such
//!   as `SELECT 1`) get a canned success without reaching the delegate

pub mod config;
pub mod controller;
pub mod data_set;
pub mod error;
pub mod message;

pub use config::JdbcEndpointConfiguration;
pub use controller::{JdbcController, JdbcEndpointAdapterController};
pub use data_set::{DataSet, DataSetCreator, DatabaseResult};
pub use error::JdbcServerError;
pub use message::{headers, JdbcMessage, Operation, OperationResult, Property};
