//! Wire shape of a delivered event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::{ChangeEvent, Topic};

/// One event as sent to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    /// Path relative to the working copy root.
    pub filename: String,
    /// Change classification.
    pub topic: Topic,
    /// File contents, base64-encoded on the wire.
    #[serde(with = "base64_contents")]
    pub contents: Option<Vec<u8>>,
    /// Extra attributes such as `old-path`.
    pub metadata: BTreeMap<String, String>,
}

impl From<&ChangeEvent> for EventResponse {
    fn from(event: &ChangeEvent) -> Self {
        Self {
            filename: event.path.clone(),
            topic: event.topic,
            contents: event.contents.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

mod base64_contents {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        contents: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match contents {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
