//! Request and response shapes for CMAC generation
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


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loosely-typed batch element, as handed over by the routing layer
pub type BatchInputItem = Map<String, Value>;

/// A CMAC generation request.
///
/// Built by the host's routing layer (or deserialized from JSON); the core
/// never looks fields up anywhere else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmacRequest {
    /// Key name
    pub name: String,
    /// Base64-encoded input for the single-input form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Truncation length from the request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_length: Option<i64>,
    /// Truncation length embedded in the request path; wins over `mac_length`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_mac_length: Option<i64>,
    /// Request-wide key version, 0 for latest
    #[serde(default)]
    pub key_version: i64,
    /// Batch form; when non-empty, `input` is ignored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch_input: Vec<BatchInputItem>,
}

impl CmacRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_key_version(mut self, version: i64) -> Self {
        self.key_version = version;
        self
    }

    pub fn with_mac_length(mut self, length: i64) -> Self {
        self.mac_length = Some(length);
        self
    }

    pub fn with_batch(mut self, items: Vec<BatchInputItem>) -> Self {
        self.batch_input = items;
        self
    }

    /// Whether the request uses the batch form
    pub fn is_batch(&self) -> bool {
        !self.batch_input.is_empty()
    }

    /// Truncation length to apply, path parameter first
    pub fn requested_mac_length(&self) -> Option<i64> {
        self.url_mac_length.or(self.mac_length)
    }
}

/// One entry of a batch response, aligned by index with `batch_input`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponseItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmac: Option<String>,
    /// Only set by verification; generation leaves it empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// CMAC generation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CmacResponse {
    Batch { batch_results: Vec<BatchResponseItem> },
    Single { cmac: String },
}

impl CmacResponse {
    /// The MAC of a single-input response
    pub fn cmac(&self) -> Option<&str> {
        match self {
            CmacResponse::Single { cmac } => Some(cmac.as_str()),
            CmacResponse::Batch { .. } => None,
        }
    }

    /// The entries of a batch response
    pub fn batch_results(&self) -> Option<&[BatchResponseItem]> {
        match self {
            CmacResponse::Batch { batch_results } => Some(batch_results.as_slice()),
            CmacResponse::Single { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_mac_length_wins() {
        let mut request = CmacRequest::new("k").with_mac_length(8);
        assert_eq!(request.requested_mac_length(), Some(8));
        request.url_mac_length = Some(12);
        assert_eq!(request.requested_mac_length(), Some(12));
    }

    #[test]
    fn test_request_from_json() {
        let request: CmacRequest = serde_json::from_value(json!({
            "name": "orders",
            "key_version": 2,
            "batch_input": [{"input": "", "reference": "a"}, {}]
        }))
        .unwrap();
        assert_eq!(request.key_version, 2);
        assert!(request.is_batch());
        assert!(request.batch_input[1].is_empty());
        assert!(request.input.is_none());
    }

    #[test]
    fn test_response_shapes() {
        let single = CmacResponse::Single {
            cmac: "vault:v1:abc".to_string(),
        };
        assert_eq!(serde_json::to_value(&single).unwrap(), json!({"cmac": "vault:v1:abc"}));

        let batch = CmacResponse::Batch {
            batch_results: vec![
                BatchResponseItem {
                    cmac: Some("vault:v1:abc".to_string()),
                    reference: Some("r0".to_string()),
                    ..Default::default()
                },
                BatchResponseItem {
                    error: Some("missing input to process".to_string()),
                    ..Default::default()
                },
            ],
        };
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({"batch_results": [
                {"cmac": "vault:v1:abc", "reference": "r0"},
                {"error": "missing input to process"}
            ]})
        );
    }
}
