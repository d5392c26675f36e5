// Booth submissions in JSON, as produced by the data entry forms.

use booth_aggregation::{RawBooth, RawCount};
use log::{debug, warn};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use std::fs;

use crate::tally::{
    io_common::{field_key, make_default_id},
    *,
};

pub fn read_json_booths(path: String) -> BTallyResult<Vec<RawBooth>> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path: path.clone() })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    parse_booths(&js, &path)
}

/// Reads an array of booth objects, or an object with a `booths` array.
pub fn parse_booths(js: &JSValue, path: &str) -> BTallyResult<Vec<RawBooth>> {
    let default_id = make_default_id(path);
    let items = match js {
        JSValue::Array(items) => items,
        JSValue::Object(obj) => match get_field(obj, "booths") {
            Some(JSValue::Array(items)) => items,
            _ => {
                return Err(Box::new(TallyError::JsonWrongShape {
                    content: "expected an array of booths".to_string(),
                }))
            }
        },
        _ => {
            return Err(Box::new(TallyError::JsonWrongShape {
                content: format!("expected an array of booths, found {}", js),
            }))
        }
    };

    let mut res: Vec<RawBooth> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let obj = item.as_object().context(JsonWrongShapeSnafu {
            content: format!("booth #{} is not an object: {}", idx + 1, item),
        })?;
        let booth_id = read_text(get_field(obj, "boothId")).unwrap_or_else(|| default_id(idx + 1));
        let booth_name = read_text(get_field(obj, "boothName")).unwrap_or_default();
        let totals = get_field(obj, "totals").and_then(|t| t.as_object());
        let booth = RawBooth {
            timestamp: read_text(get_field(obj, "timestamp")),
            primary: read_counts(get_field(obj, "primaryVotes"), &booth_id),
            tcp: read_distributions(get_field(obj, "tcpVotes"), &booth_id),
            formal: read_count(totals.and_then(|t| get_field(t, "formal"))),
            informal: read_count(totals.and_then(|t| get_field(t, "informal"))),
            total: read_count(totals.and_then(|t| get_field(t, "total"))),
            booth_id,
            booth_name,
        };
        debug!("parse_booths: {:?}", booth);
        res.push(booth);
    }
    Ok(res)
}

// Looks a field up without regard to case or separators.
fn get_field<'a>(obj: &'a JSMap<String, JSValue>, name: &str) -> Option<&'a JSValue> {
    let key = field_key(name);
    obj.iter()
        .find(|(k, _)| field_key(k) == key)
        .map(|(_, v)| v)
}

fn read_text(x: Option<&JSValue>) -> Option<String> {
    match x {
        Some(JSValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(JSValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn read_count(x: Option<&JSValue>) -> RawCount {
    match x {
        Some(JSValue::Number(n)) => match n.as_i64() {
            Some(i) => RawCount::Integer(i),
            None => n.as_f64().map(RawCount::Float).unwrap_or(RawCount::Missing),
        },
        Some(JSValue::String(s)) => RawCount::Text(s.clone()),
        _ => RawCount::Missing,
    }
}

fn read_counts(x: Option<&JSValue>, booth_id: &str) -> Vec<(String, RawCount)> {
    match x {
        Some(JSValue::Object(obj)) => obj
            .iter()
            .map(|(k, v)| (k.clone(), read_count(Some(v))))
            .collect(),
        None | Some(JSValue::Null) => Vec::new(),
        Some(other) => {
            warn!("booth {}: ignoring vote counts {}", booth_id, other);
            Vec::new()
        }
    }
}

fn read_distributions(
    x: Option<&JSValue>,
    booth_id: &str,
) -> Vec<(String, Vec<(String, RawCount)>)> {
    match x {
        Some(JSValue::Object(obj)) => obj
            .iter()
            .map(|(label, dist)| (label.clone(), read_counts(Some(dist), booth_id)))
            .collect(),
        None | Some(JSValue::Null) => Vec::new(),
        Some(other) => {
            warn!("booth {}: ignoring TCP votes {}", booth_id, other);
            Vec::new()
        }
    }
}
