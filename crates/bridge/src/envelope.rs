use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

use crate::error::{BridgeResult, DecodePayloadSnafu, MissingPayloadSnafu};

/// Turn number attached to a chat request and echoed by the host.
///
/// Every submit allocates a new epoch so stale host envelopes can be rejected
/// without a wall-clock guard window.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Envelope posted from the webview to the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,
}

impl ClientEnvelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Decodes `data` into `T`, failing when the payload is absent.
    pub fn decode_data<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        let data = self.data.clone().context(MissingPayloadSnafu {
            stage: "client-envelope-decode-data",
            discriminant: self.kind.clone(),
        })?;

        serde_json::from_value(data).context(DecodePayloadSnafu {
            stage: "client-envelope-decode-data",
            discriminant: self.kind.clone(),
        })
    }
}

/// Payload of a host envelope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvelopeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl EnvelopeValue {
    pub fn completion(text: impl Into<String>) -> Self {
        Self {
            completion: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// True when neither completion text nor an error is carried.
    pub fn is_empty(&self) -> bool {
        self.completion.as_deref().is_none_or(str::is_empty) && self.error.is_none()
    }
}

/// Envelope posted from the host to the webview.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<EnvelopeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,
}

impl HostEnvelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: EnvelopeValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_data(self, data: Value) -> Self {
        self.with_value(EnvelopeValue::data(data))
    }

    pub fn with_epoch(mut self, epoch: Option<Epoch>) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn completion(&self) -> Option<&str> {
        self.value.as_ref().and_then(|value| value.completion.as_deref())
    }

    pub fn error(&self) -> Option<&str> {
        self.value.as_ref().and_then(|value| value.error.as_deref())
    }

    /// Raw `value.data`, treating JSON `null` as absent.
    pub fn data(&self) -> Option<&Value> {
        self.value
            .as_ref()
            .and_then(|value| value.data.as_ref())
            .filter(|data| !data.is_null())
    }

    /// Decodes `value.data` into `T`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        let data = self.data().cloned().context(MissingPayloadSnafu {
            stage: "host-envelope-decode-data",
            discriminant: self.kind.clone(),
        })?;

        serde_json::from_value(data).context(DecodePayloadSnafu {
            stage: "host-envelope-decode-data",
            discriminant: self.kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_envelope_omits_absent_fields_on_the_wire() {
        let envelope = ClientEnvelope::new("get-theme");
        let wire = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(wire, json!({ "type": "get-theme" }));
    }

    #[test]
    fn host_envelope_reads_nested_value_fields() {
        let envelope: HostEnvelope = serde_json::from_value(json!({
            "type": "completion-token",
            "value": { "completion": "Hel", "type": "chat", "data": "rust" },
            "epoch": 3
        }))
        .expect("deserialize");

        assert_eq!(envelope.completion(), Some("Hel"));
        assert_eq!(envelope.epoch, Some(Epoch::new(3)));
        assert_eq!(
            envelope.value.and_then(|value| value.kind),
            Some("chat".to_string())
        );
    }

    #[test]
    fn null_data_counts_as_missing_payload() {
        let envelope = HostEnvelope::new("providers-all").with_data(serde_json::Value::Null);
        assert!(envelope.data().is_none());
        assert!(envelope.decode_data::<Vec<String>>().is_err());
    }

    #[test]
    fn empty_value_has_neither_text_nor_error() {
        assert!(EnvelopeValue::default().is_empty());
        assert!(EnvelopeValue::completion("").is_empty());
        assert!(!EnvelopeValue::completion("x").is_empty());
        assert!(!EnvelopeValue::error("boom").is_empty());
    }
}
