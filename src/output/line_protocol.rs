/// Line protocol rendering for decoded readings
///
/// `<measurement>,<tags> <fields> <timestamp-ns>`, one line per reading.
use std::fmt::Write;

use time::OffsetDateTime;

use crate::models::{PriceReading, Reading, RecordLabels, SummationReading, UsageReading};

/// Tag value written when a hardware address could not be decoded
const UNKNOWN_DEVICE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(u64),
}

/// A single line protocol record under construction
#[derive(Debug, Clone)]
pub struct LineRecord {
    measurement: String,
    tags: Vec<(&'static str, String)>,
    fields: Vec<(&'static str, FieldValue)>,
    timestamp: OffsetDateTime,
}

impl LineRecord {
    pub fn new(measurement: &str, timestamp: OffsetDateTime) -> Self {
        LineRecord {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: &'static str, value: &str) -> Self {
        self.tags.push((key, value.to_string()));
        self
    }

    pub fn float(mut self, key: &'static str, value: f64) -> Self {
        self.fields.push((key, FieldValue::Float(value)));
        self
    }

    pub fn integer(mut self, key: &'static str, value: u64) -> Self {
        self.fields.push((key, FieldValue::Integer(value)));
        self
    }

    pub fn render(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", key, escape(value, &[',', '=', ' ']));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            // Fixed notation, never exponential
            let _ = match value {
                FieldValue::Float(v) => write!(line, "{}={:.6}", key, v),
                FieldValue::Integer(v) => write!(line, "{}={}", key, v),
            };
        }

        let _ = write!(line, " {}", self.timestamp.unix_timestamp_nanos());
        line
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Start a record carrying the host, device, meter and type tags
fn identity_record(
    labels: &RecordLabels,
    device: Option<&str>,
    meter: Option<&str>,
    kind: &str,
    timestamp: OffsetDateTime,
) -> LineRecord {
    let mut record = LineRecord::new(&labels.measurement, timestamp);
    if let Some(host) = labels.host.as_deref() {
        record = record.tag("host", host);
    }
    record
        .tag("device", device.unwrap_or(UNKNOWN_DEVICE))
        .tag("meter", meter.unwrap_or(UNKNOWN_DEVICE))
        .tag("type", kind)
}

/// Render one decoded reading
pub fn format_reading(labels: &RecordLabels, reading: &Reading) -> String {
    let record = match reading {
        Reading::Demand(r) => identity_record(
            labels,
            r.device.as_deref(),
            r.meter.as_deref(),
            reading.kind(),
            r.timestamp,
        )
        .float("value", r.demand),
        Reading::Summation(r) => identity_record(
            labels,
            r.device.as_deref(),
            r.meter.as_deref(),
            reading.kind(),
            r.timestamp,
        )
        .float("delivered", r.delivered)
        .float("received", r.received),
        Reading::Price(r) => identity_record(
            labels,
            r.device.as_deref(),
            r.meter.as_deref(),
            reading.kind(),
            r.timestamp,
        )
        .float("value", r.price)
        .integer("tier", r.tier)
        .integer("currency", r.currency),
    };
    record.render()
}

/// Render a summation reading joined with the current price
///
/// Identity tags and timestamp come from the summation.
pub fn format_summation_with_price(
    labels: &RecordLabels,
    summation: &SummationReading,
    price: &PriceReading,
) -> String {
    identity_record(
        labels,
        summation.device.as_deref(),
        summation.meter.as_deref(),
        "summation",
        summation.timestamp,
    )
    .float("delivered", summation.delivered)
    .float("received", summation.received)
    .float("price", price.price)
    .integer("tier", price.tier)
    .render()
}

/// Render a legacy usage reading
pub fn format_usage(labels: &RecordLabels, usage: &UsageReading) -> String {
    let mut record = LineRecord::new(&labels.measurement, usage.timestamp);
    if let Some(host) = labels.host.as_deref() {
        record = record.tag("host", host);
    }
    record.float("demand", usage.demand).render()
}
