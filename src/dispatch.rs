/// Routing of gateway fragments to decoders and the output sink
use log::{debug, error, warn};

use crate::decoder::{decode_demand, decode_price, decode_summation, DecodeError};
use crate::models::{Reading, RecordLabels};
use crate::output::{format_reading, LineSink};
use crate::utils::format_datetime;
use crate::xml::Element;

/// Wrapper element the gateway uses for pushed notifications
const UPLOAD_ROOT: &str = "rainforest";

/// Every fragment type the gateway is known to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    InstantaneousDemand,
    CurrentSummationDelivered,
    PriceCluster,
    DeviceInfo,
    NetworkInfo,
    MessageCluster,
    TimeCluster,
    ScheduleInfo,
    BlockPriceDetail,
    Unknown,
}

impl Category {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "InstantaneousDemand" => Category::InstantaneousDemand,
            "CurrentSummationDelivered" => Category::CurrentSummationDelivered,
            "PriceCluster" => Category::PriceCluster,
            "DeviceInfo" => Category::DeviceInfo,
            "NetworkInfo" => Category::NetworkInfo,
            "MessageCluster" => Category::MessageCluster,
            "TimeCluster" => Category::TimeCluster,
            "ScheduleInfo" => Category::ScheduleInfo,
            "BlockPriceDetail" => Category::BlockPriceDetail,
            _ => Category::Unknown,
        }
    }

    /// Decode a fragment of this category. Acknowledged categories without
    /// a structured reading yield `None`.
    pub fn decode(self, fragment: &Element) -> Result<Option<Reading>, DecodeError> {
        let reading = match self {
            Category::InstantaneousDemand => Reading::Demand(decode_demand(fragment)?),
            Category::CurrentSummationDelivered => Reading::Summation(decode_summation(fragment)?),
            Category::PriceCluster => Reading::Price(decode_price(fragment)?),
            Category::DeviceInfo
            | Category::NetworkInfo
            | Category::MessageCluster
            | Category::TimeCluster
            | Category::ScheduleInfo
            | Category::BlockPriceDetail => {
                debug!("Ignoring {:?} fragment", self);
                return Ok(None);
            }
            Category::Unknown => return Ok(None),
        };
        Ok(Some(reading))
    }
}

/// Locate the category element, accepting both the upload wrapper and a
/// bare category element as the document root
pub fn category_element(root: &Element) -> Option<&Element> {
    if root.name == UPLOAD_ROOT {
        root.first_child()
    } else {
        Some(root)
    }
}

/// Decode one fragment and write its record to the sink
///
/// Returns true when a line was written. Decode failures are logged and
/// confined to this fragment.
pub fn dispatch(tag: &str, fragment: &Element, labels: &RecordLabels, sink: &LineSink) -> bool {
    let reading = match Category::from_tag(tag).decode(fragment) {
        Ok(Some(reading)) => reading,
        Ok(None) => return false,
        Err(e) => {
            warn!("Dropping {} fragment: {}", tag, e);
            return false;
        }
    };

    debug!(
        "Decoded {} reading taken at {}",
        reading.kind(),
        format_datetime(&reading.timestamp())
    );

    match sink.emit(&format_reading(labels, &reading)) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to write {} record: {}", reading.kind(), e);
            false
        }
    }
}

/// Parse a complete document and dispatch its category element
pub fn dispatch_document(document: &str, labels: &RecordLabels, sink: &LineSink) -> bool {
    let root = match Element::parse(document) {
        Ok(root) => root,
        Err(e) => {
            warn!("Dropping unparsable document: {}", e);
            return false;
        }
    };

    match category_element(&root) {
        Some(fragment) => dispatch(&fragment.name, fragment, labels, sink),
        None => {
            debug!("Empty {} document", root.name);
            false
        }
    }
}
