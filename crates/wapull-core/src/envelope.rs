//! Response envelope decoding.
//!
//! Accounts wrap the same item list differently. Shapes are tried in order:
//! a bare array, `{"data": [...]}`, `{"data": {"items": [...]}}`, and finally
//! `{"items": [...]}`.

use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Bare(Vec<Value>),
    Data { data: DataField },
    Items { items: Vec<Value> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DataField {
    List(Vec<Value>),
    Nested { items: Vec<Value> },
}

/// Extract the item list from a response body.
///
/// Returns the body back unchanged when no known shape matches.
pub fn decode_envelope(body: Value) -> Result<Vec<Value>, Value> {
    match Envelope::deserialize(&body) {
        Ok(Envelope::Bare(items)) => Ok(items),
        Ok(Envelope::Data {
            data: DataField::List(items),
        }) => Ok(items),
        Ok(Envelope::Data {
            data: DataField::Nested { items },
        }) => Ok(items),
        Ok(Envelope::Items { items }) => Ok(items),
        Err(_) => Err(body),
    }
}
