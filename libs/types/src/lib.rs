//! # Trellis Types
//!
//! Message model and per-test-case state shared by every Trellis crate.
//!
//! ## Design Philosophy
//!
//! - **One envelope**: every transport exchanges the same [`Message`]
//! - **Explicit wiring**: endpoints, validators and other collaborators are
//!   bound by name in a [`ReferenceResolver`] carried by the [`TestContext`]
//! - **Per test isolation**: a [`TestContext`] belongs to exactly one test
//!   case; clones share state so concurrent branches of that test see the
//!   same variables
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Message, TestContext};
//!
//! let context = TestContext::new();
//! context.set_variable("operation", "greeting");
//!
//! let message = Message::new("Hello ${operation}")
//!     .with_header("operation", "${operation}");
//! let resolved = context.replace_message_content(&message).unwrap();
//!
//! assert_eq!(resolved.payload().as_text(), "Hello greeting");
//! assert_eq!(resolved.header_str("operation").as_deref(), Some("greeting"));
//! ```

pub mod context;
pub mod error;
pub mod message;
pub mod resolver;

pub use context::{MessageStore, TestContext};
pub use error::ContextError;
pub use message::{headers, Message, MessageType, Payload};
pub use resolver::ReferenceResolver;
