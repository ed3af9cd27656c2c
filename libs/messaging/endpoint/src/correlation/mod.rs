//! Request/reply correlation
//!
//! A [`Correlator`] derives a key from a request. The producer saves the key
//! in the test context under [`Correlator::key_name`], the reply is stored in
//! a [`ReplyStore`] under the same key and the consumer polls for it through
//! a [`PollingCorrelationManager`].

mod manager;
mod store;

pub use manager::PollingCorrelationManager;
pub use store::ReplyStore;

use std::fmt;
use std::sync::Arc;
use types::Message;

/// Prefix of the context variable holding the pending correlation key
pub const CORRELATION_KEY_PREFIX: &str = "trellis_message_correlator_";

/// Derives correlation keys from messages
pub trait Correlator: Send + Sync + fmt::Debug {
    /// Key matching a request with its reply
    fn correlation_key(&self, message: &Message) -> String;

    /// Context variable name that holds the key for `endpoint`
    fn key_name(&self, endpoint: &str) -> String {
        format!("{}{}", CORRELATION_KEY_PREFIX, endpoint)
    }
}

/// Correlates on the message id
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessageCorrelator;

impl Correlator for DefaultMessageCorrelator {
    fn correlation_key(&self, message: &Message) -> String {
        message.id().to_string()
    }
}

/// Correlates on the values of a fixed list of headers
///
/// Missing headers contribute an empty value, so two messages lacking the
/// same header still correlate.
#[derive(Debug, Clone)]
pub struct HeaderCorrelator {
    headers: Vec<String>,
}

impl HeaderCorrelator {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Correlator for HeaderCorrelator {
    fn correlation_key(&self, message: &Message) -> String {
        self.headers
            .iter()
            .map(|name| {
                format!(
                    "{} = '{}'",
                    name,
                    message.header_str(name).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

type KeyFn = dyn Fn(&Message) -> String + Send + Sync;

/// Correlates with a caller supplied function, typically over the payload
#[derive(Clone)]
pub struct FnCorrelator {
    label: String,
    key: Arc<KeyFn>,
}

impl FnCorrelator {
    pub fn new<F>(label: impl Into<String>, key: F) -> Self
    where
        F: Fn(&Message) -> String + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            key: Arc::new(key),
        }
    }
}

impl fmt::Debug for FnCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCorrelator")
            .field("label", &self.label)
            .finish()
    }
}

impl Correlator for FnCorrelator {
    fn correlation_key(&self, message: &Message) -> String {
        (self.key)(message)
    }
}

/// Header carrying the client's correlation key across a direct channel
pub const CORRELATION_KEY_HEADER: &str = "trellis_correlation_key";

/// Key the serving side should store a reply under
///
/// Prefers the key stamped by the requesting side and falls back to the
/// local correlator.
pub fn request_key(correlator: &dyn Correlator, request: &Message) -> String {
    request
        .header_str(CORRELATION_KEY_HEADER)
        .unwrap_or_else(|| correlator.correlation_key(request))
}
