//! Normalization of single-input and batch requests into work items
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::CmacError;
use crate::request::BatchInputItem;
use serde_json::Value;

/// Presence of an `input` field.
///
/// An explicitly empty input is valid (a MAC over zero bytes); a missing one
/// is an error for that item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputField {
    Absent,
    Empty,
    Value(String),
}

impl From<Option<&str>> for InputField {
    fn from(value: Option<&str>) -> Self {
        match value {
            None => InputField::Absent,
            Some("") => InputField::Empty,
            Some(s) => InputField::Value(s.to_string()),
        }
    }
}

/// One unit of work; its position in the normalized list is its index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub input: InputField,
    /// Overrides the request-wide version when set
    pub key_version: Option<i64>,
    /// Caller correlation value, echoed back untouched
    pub reference: Option<String>,
    /// Set when a field had the wrong type; the item fails with this error
    pub malformed: Option<CmacError>,
}

impl BatchItem {
    fn single(input: Option<&str>) -> Self {
        Self {
            input: InputField::from(input),
            key_version: None,
            reference: None,
            malformed: None,
        }
    }

    fn from_map(map: &BatchInputItem) -> Self {
        let mut malformed = None;

        let input = match map.get("input") {
            None => InputField::Absent,
            Some(Value::String(s)) => InputField::from(Some(s.as_str())),
            Some(_) => {
                malformed = Some(CmacError::InvalidParameter(
                    "input must be a base64-encoded string".to_string(),
                ));
                InputField::Absent
            }
        };

        let key_version = match map.get("key_version") {
            None | Some(Value::Null) => None,
            Some(value) => match parse_version(value) {
                Ok(version) => version,
                Err(e) => {
                    if malformed.is_none() {
                        malformed = Some(e);
                    }
                    None
                }
            },
        };

        let reference = map.get("reference").and_then(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Self {
            input,
            key_version,
            reference,
            malformed,
        }
    }
}

/// Accepts integers and decimal strings; an empty string means "not set".
fn parse_version(value: &Value) -> Result<Option<i64>, CmacError> {
    let invalid = || CmacError::InvalidVersion(format!("unable to parse key_version: {}", value));
    match value {
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(invalid),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Build the ordered work list for a request.
///
/// A non-empty batch always wins and `single_input` is ignored; otherwise a
/// single item without reference is built from `single_input`.
pub fn normalize(single_input: Option<&str>, batch_input: &[BatchInputItem]) -> Vec<BatchItem> {
    if batch_input.is_empty() {
        return vec![BatchItem::single(single_input)];
    }
    batch_input.iter().map(BatchItem::from_map).collect()
}
