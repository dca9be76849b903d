//! Core types: time resolution, durations, events, tracing

pub mod duration;
pub mod event;
pub mod resolver;
pub mod time;
pub mod tracing;

pub use duration::{DurationError, format_minutes, parse_duration};
pub use event::{EventRequest, EventResult, EventValidationError};
pub use resolver::{TimeError, TimeResolver, TimeResult, ZoneOrigin, parse_time};
pub use time::{EventTime, Zone, format_long, format_short};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
