/// Settings loading (defaults, `topicbus.toml`, `TOPICBUS_*` environment).
pub mod config;
/// Caller-owned ZeroMQ context with an explicit lifecycle.
pub mod context;
/// Transport, codec and logging error types.
pub mod error;
/// Event serialization seam.
pub mod event;
/// `tracing` initialisation (filters, console formats).
pub mod logging;
/// Publisher endpoint: PUB socket, untagged and topic-tagged publish.
pub mod publisher;
/// Subscriber endpoint: SUB socket, topic filters, background receive loop.
pub mod subscriber;
/// Topic validation and canonical form.
pub mod topic;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use config::Settings;
pub use context::{ContextStatus, TransportContext};
pub use error::{CodecError, LoggingError, TransportError};
pub use event::{Event, MsgPack};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use publisher::Publisher;
pub use subscriber::{Callbacks, EventHandler, Subscriber};
pub use topic::{sanitize, Topic};
/// Status codes, errors and propagation helpers shared by every operation.
pub use topicbus_error::{BusResult, EndpointError, ErrorExt, StackError, StatusCode, TopicError};
