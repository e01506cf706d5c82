/// Gateway telemetry decoding into structured readings
use thiserror::Error;
use time::OffsetDateTime;

use crate::models::{
    DemandReading, PriceReading, SummationReading, UsageData, UsageReading,
};
use crate::utils::{normalize_mac, parse_hex, scaled_watts, y2k_to_datetime};
use crate::xml::Element;

/// Raw price meaning "no price available"
const PRICE_UNAVAILABLE: u64 = u32::MAX as u64;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document contains no elements")]
    EmptyDocument,
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("body is not valid {charset}")]
    Encoding { charset: String },
    #[error("missing field {0}")]
    MissingField(String),
    #[error("field {field} is not hexadecimal: {value:?}")]
    InvalidHex { field: String, value: String },
    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: String, value: String },
    #[error("unknown demand unit {0:?}")]
    UnknownUnit(String),
    #[error("timestamp out of range: {0:#x}")]
    InvalidTimestamp(u64),
}

/// Hardware address of a field; absent or malformed addresses yield `None`
fn get_mac(elem: &Element, field: &str) -> Option<String> {
    elem.child(field).and_then(|c| normalize_mac(&c.text))
}

fn get_hex(elem: &Element, field: &str) -> Result<u64, DecodeError> {
    parse_hex(field, elem.field(field)?)
}

fn get_datetime_y2k(elem: &Element, field: &str) -> Result<OffsetDateTime, DecodeError> {
    y2k_to_datetime(get_hex(elem, field)?)
}

fn get_watts(
    elem: &Element,
    field: &str,
    multiplier_field: &str,
    divisor_field: &str,
) -> Result<f64, DecodeError> {
    let value = get_hex(elem, field)?;
    let multiplier = get_hex(elem, multiplier_field)?;
    let divisor = get_hex(elem, divisor_field)?;
    Ok(scaled_watts(value, multiplier, divisor))
}

/// Decode an `InstantaneousDemand` fragment
///
/// ```xml
/// <InstantaneousDemand>
///   <DeviceMacId>0xdeadbeef0000661a</DeviceMacId>
///   <MeterMacId>0xdeadbeef00e33f60</MeterMacId>
///   <TimeStamp>0x1f441da9</TimeStamp>
///   <Demand>0x000b79</Demand>
///   <Multiplier>0x00000001</Multiplier>
///   <Divisor>0x000003e8</Divisor>
/// </InstantaneousDemand>
/// ```
pub fn decode_demand(elem: &Element) -> Result<DemandReading, DecodeError> {
    Ok(DemandReading {
        device: get_mac(elem, "DeviceMacId"),
        meter: get_mac(elem, "MeterMacId"),
        demand: get_watts(elem, "Demand", "Multiplier", "Divisor")?,
        timestamp: get_datetime_y2k(elem, "TimeStamp")?,
    })
}

/// Decode a `CurrentSummationDelivered` fragment
///
/// Delivered and received share one `Multiplier`/`Divisor` pair.
pub fn decode_summation(elem: &Element) -> Result<SummationReading, DecodeError> {
    Ok(SummationReading {
        device: get_mac(elem, "DeviceMacId"),
        meter: get_mac(elem, "MeterMacId"),
        delivered: get_watts(elem, "SummationDelivered", "Multiplier", "Divisor")?,
        received: get_watts(elem, "SummationReceived", "Multiplier", "Divisor")?,
        timestamp: get_datetime_y2k(elem, "TimeStamp")?,
    })
}

/// Decode a `PriceCluster` fragment
///
/// `Price` is an integer with `TrailingDigits` implied decimal places.
/// An all-ones price means no price is published and decodes to zero.
pub fn decode_price(elem: &Element) -> Result<PriceReading, DecodeError> {
    let raw_price = get_hex(elem, "Price")?;
    let price = if raw_price == PRICE_UNAVAILABLE {
        0.0
    } else {
        let trailing_digits = get_hex(elem, "TrailingDigits")?;
        let exponent = i32::try_from(trailing_digits).unwrap_or(i32::MAX);
        let divisor = 10f64.powi(exponent);
        let divisor = if divisor == 0.0 { 1.0 } else { divisor };
        raw_price as f64 / divisor
    };

    Ok(PriceReading {
        device: get_mac(elem, "DeviceMacId"),
        meter: get_mac(elem, "MeterMacId"),
        price,
        currency: get_hex(elem, "Currency")?,
        tier: get_hex(elem, "Tier")?,
        timestamp: get_datetime_y2k(elem, "TimeStamp")?,
    })
}

fn parse_decimal<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, DecodeError> {
    value.trim().parse().map_err(|_| DecodeError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Decode the legacy JSON usage document
///
/// `demand_timestamp` is in gateway local time; the offset between the
/// reported UTC and local clocks brings it back to UTC.
pub fn decode_usage(data: &UsageData) -> Result<UsageReading, DecodeError> {
    let scale = match data.demand_units.as_str() {
        "W" => 1.0,
        "kW" => 1000.0,
        other => return Err(DecodeError::UnknownUnit(other.to_string())),
    };
    let demand: f64 = parse_decimal("demand", &data.demand)?;
    let local_timestamp: i64 = parse_decimal("demand_timestamp", &data.demand_timestamp)?;
    let utc_time: i64 = parse_decimal("timezone_utcTime", &data.timezone_utc_time)?;
    let local_time: i64 = parse_decimal("timezone_localTime", &data.timezone_local_time)?;

    let utc_timestamp = utc_time
        .checked_sub(local_time)
        .and_then(|offset| local_timestamp.checked_add(offset))
        .ok_or_else(|| DecodeError::InvalidNumber {
            field: "demand_timestamp".to_string(),
            value: data.demand_timestamp.clone(),
        })?;
    let timestamp = OffsetDateTime::from_unix_timestamp(utc_timestamp)
        .map_err(|_| DecodeError::InvalidTimestamp(utc_timestamp as u64))?;

    Ok(UsageReading {
        demand: demand * scale,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMAND: &str = r#"<InstantaneousDemand>
      <DeviceMacId>0xdeadbeef0000661a</DeviceMacId>
      <MeterMacId>0xdeadbeef00e33f60</MeterMacId>
      <TimeStamp>0x1f441da9</TimeStamp>
      <Demand>0x000b79</Demand>
      <Multiplier>0x00000001</Multiplier>
      <Divisor>0x000003e8</Divisor>
      <DigitsRight>0x03</DigitsRight>
      <DigitsLeft>0x0f</DigitsLeft>
      <SuppressLeadingZero>Y</SuppressLeadingZero>
      <Port>/dev/ttySP0</Port>
    </InstantaneousDemand>"#;

    const SUMMATION: &str = r#"<CurrentSummationDelivered>
      <DeviceMacId>0xdeadbeef0000661a</DeviceMacId>
      <MeterMacId>0xdeadbeef00e33f60</MeterMacId>
      <TimeStamp>0x1f442748</TimeStamp>
      <SummationDelivered>0x000000000324b034</SummationDelivered>
      <SummationReceived>0x0000000000000000</SummationReceived>
      <Multiplier>0x00000001</Multiplier>
      <Divisor>0x000003e8</Divisor>
    </CurrentSummationDelivered>"#;

    fn price_fragment(price: &str, trailing_digits: &str) -> Element {
        Element::parse(&format!(
            "<PriceCluster>\
             <DeviceMacId>0xdeadbeef0000661a</DeviceMacId>\
             <MeterMacId>0xdeadbeef00e33f60</MeterMacId>\
             <TimeStamp>0x1f441da9</TimeStamp>\
             <Price>{}</Price>\
             <Currency>0x0348</Currency>\
             <TrailingDigits>{}</TrailingDigits>\
             <Tier>0x02</Tier>\
             </PriceCluster>",
            price, trailing_digits
        ))
        .unwrap()
    }

    #[test]
    fn decodes_demand() {
        let reading = decode_demand(&Element::parse(DEMAND).unwrap()).unwrap();
        assert_eq!(reading.device.as_deref(), Some("de-ad-be-ef-00-00-66-1a"));
        assert_eq!(reading.meter.as_deref(), Some("de-ad-be-ef-00-e3-3f-60"));
        assert!((reading.demand - 2937.0).abs() < 1e-6);
        assert_eq!(reading.timestamp.unix_timestamp(), 946_684_800 + 0x1f441da9);
    }

    #[test]
    fn decodes_summation_with_shared_scaling() {
        let reading = decode_summation(&Element::parse(SUMMATION).unwrap()).unwrap();
        assert!((reading.delivered - 52_736_052.0).abs() < 1e-3);
        assert_eq!(reading.received, 0.0);
        assert_eq!(reading.timestamp.unix_timestamp(), 946_684_800 + 0x1f442748);
    }

    #[test]
    fn decodes_price_with_trailing_digits() {
        let reading = decode_price(&price_fragment("0x0000053c", "0x03")).unwrap();
        assert!((reading.price - 1.34).abs() < 1e-9);
        assert_eq!(reading.currency, 840);
        assert_eq!(reading.tier, 2);
    }

    #[test]
    fn unavailable_price_decodes_to_zero() {
        for digits in ["0x00", "0x02", "0x0f"] {
            let reading = decode_price(&price_fragment("0xffffffff", digits)).unwrap();
            assert_eq!(reading.price, 0.0);
        }
    }

    #[test]
    fn zero_trailing_digits_divides_by_one() {
        let reading = decode_price(&price_fragment("0x2a", "0x00")).unwrap();
        assert_eq!(reading.price, 42.0);
    }

    #[test]
    fn malformed_address_does_not_fail_the_reading() {
        let doc = DEMAND.replace("0xdeadbeef0000661a", "not-a-mac");
        let reading = decode_demand(&Element::parse(&doc).unwrap()).unwrap();
        assert_eq!(reading.device, None);
        assert!(reading.meter.is_some());
    }

    #[test]
    fn missing_numeric_field_fails_the_reading() {
        let doc = DEMAND.replace("<Divisor>0x000003e8</Divisor>", "");
        let err = decode_demand(&Element::parse(&doc).unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField(ref f) if f == "Divisor"));
    }

    #[test]
    fn non_hex_numeric_field_fails_the_reading() {
        let doc = DEMAND.replace("0x000b79", "lots");
        let err = decode_demand(&Element::parse(&doc).unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidHex { ref field, .. } if field == "Demand"));
    }

    fn usage(units: &str) -> UsageData {
        UsageData {
            demand: "4.1910".into(),
            demand_units: units.into(),
            demand_timestamp: "1471297512".into(),
            timezone_utc_time: "1471322718".into(),
            timezone_local_time: "1471297518".into(),
        }
    }

    #[test]
    fn decodes_legacy_usage_in_kilowatts() {
        let reading = decode_usage(&usage("kW")).unwrap();
        assert!((reading.demand - 4191.0).abs() < 1e-6);
        assert_eq!(reading.timestamp.unix_timestamp(), 1471297512 + 25200);
    }

    #[test]
    fn decodes_legacy_usage_in_watts() {
        let reading = decode_usage(&usage("W")).unwrap();
        assert!((reading.demand - 4.191).abs() < 1e-9);
    }

    #[test]
    fn rejects_unknown_usage_units() {
        assert!(matches!(
            decode_usage(&usage("MW")),
            Err(DecodeError::UnknownUnit(ref u)) if u == "MW"
        ));
    }
}
