//! Progress events and the sinks that carry them to a live client

mod error;
mod sink;
mod types;

pub use error::{SinkError, SinkResult};
pub use sink::{ChannelSink, ProgressSink};
pub use types::{ProgressUpdate, Stage};
