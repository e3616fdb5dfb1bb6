//! Static registry of monitored channels, loaded from the topics file.
//!
//! The topics file is a JSON object whose `topics` array mixes two entry
//! shapes:
//!
//! ```json
//! {
//!   "topics": [
//!     "home/legacy/sensor",
//!     { "topic": "home/kitchen/temp", "description": "Kitchen", "type": "temperature" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::RegistryError;

/// Type tag reported for channels that do not declare one.
pub const DEFAULT_CHANNEL_TYPE: &str = "unknown";

/// A monitored channel (MQTT topic) and its display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    id: String,
    display_name: Option<String>,
    channel_type: Option<String>,
}

impl Channel {
    /// Create a channel with no display metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            channel_type: None,
        }
    }

    /// Set the human-readable name. Empty strings are treated as absent.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = non_empty(name.into());
        self
    }

    /// Set the type tag. Empty strings are treated as absent.
    pub fn with_type(mut self, channel_type: impl Into<String>) -> Self {
        self.channel_type = non_empty(channel_type.into());
        self
    }

    /// Exact subscription filter for this channel.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// Type tag, falling back to [`DEFAULT_CHANNEL_TYPE`].
    pub fn channel_type(&self) -> &str {
        self.channel_type.as_deref().unwrap_or(DEFAULT_CHANNEL_TYPE)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopicsDocument {
    #[serde(default)]
    topics: Option<Vec<TopicEntry>>,
}

/// One element of the `topics` array.
///
/// Anything that is neither a string nor an object lands in `Unsupported`
/// and is skipped rather than failing the whole file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicEntry {
    Legacy(String),
    Detailed(serde_json::Map<String, serde_json::Value>),
    Unsupported(serde_json::Value),
}

impl TopicEntry {
    fn into_channel(self) -> Option<Channel> {
        match self {
            TopicEntry::Legacy(topic) if !topic.is_empty() => Some(Channel::new(topic)),
            TopicEntry::Legacy(_) => None,
            TopicEntry::Detailed(fields) => {
                let text = |key: &str| fields.get(key).and_then(serde_json::Value::as_str);

                let topic = text("topic").filter(|t| !t.is_empty())?;
                let mut channel = Channel::new(topic);
                if let Some(description) = text("description") {
                    channel = channel.with_display_name(description);
                }
                if let Some(channel_type) = text("type") {
                    channel = channel.with_type(channel_type);
                }
                Some(channel)
            }
            TopicEntry::Unsupported(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelRegistry
// ---------------------------------------------------------------------------

/// Ordered, immutable set of channels to monitor.
///
/// Order follows the topics file; a repeated identifier keeps its first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    /// A registry with no channels.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from channels, dropping repeated identifiers.
    pub fn from_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
        let mut seen = HashSet::new();
        let channels = channels
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();
        Self { channels }
    }

    /// Parse the JSON topics document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: TopicsDocument = serde_json::from_str(json)?;
        let entries = document.topics.unwrap_or_default();
        Ok(Self::from_channels(
            entries.into_iter().filter_map(TopicEntry::into_channel),
        ))
    }

    /// Read and parse the topics file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RegistryError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                RegistryError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::from_json(&contents).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channel identifiers in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(Channel::id)
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
