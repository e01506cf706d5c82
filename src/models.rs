use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct DemandReading {
    pub device: Option<String>,
    pub meter: Option<String>,
    pub demand: f64,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummationReading {
    pub device: Option<String>,
    pub meter: Option<String>,
    pub delivered: f64,
    pub received: f64,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceReading {
    pub device: Option<String>,
    pub meter: Option<String>,
    pub price: f64,
    pub currency: u64,
    pub tier: u64,
    pub timestamp: OffsetDateTime,
}

/// One decoded telemetry reading, tagged by category
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Demand(DemandReading),
    Summation(SummationReading),
    Price(PriceReading),
}

impl Reading {
    /// Value of the `type` tag in rendered records
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Demand(_) => "demand",
            Reading::Summation(_) => "summation",
            Reading::Price(_) => "price",
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            Reading::Demand(r) => r.timestamp,
            Reading::Summation(r) => r.timestamp,
            Reading::Price(r) => r.timestamp,
        }
    }
}

/// Labels applied to every record written by one mode of operation
#[derive(Debug, Clone)]
pub struct RecordLabels {
    pub measurement: String,
    pub host: Option<String>,
}

/// Subset of the legacy `get_usage_data` + `get_timezone` JSON document
///
/// Every value arrives as a string, e.g. `"demand": "4.1910"`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageData {
    pub demand: String,
    pub demand_units: String,
    pub demand_timestamp: String,
    #[serde(rename = "timezone_utcTime")]
    pub timezone_utc_time: String,
    #[serde(rename = "timezone_localTime")]
    pub timezone_local_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageReading {
    pub demand: f64,
    pub timestamp: OffsetDateTime,
}
