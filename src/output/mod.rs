pub mod line_protocol;
pub mod sink;

pub use line_protocol::{format_reading, format_summation_with_price, format_usage};
pub use sink::LineSink;
