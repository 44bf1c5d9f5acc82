//! Step outputs handed from one step to the next.

use crate::registry::ArtifactKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// A media file hosted by the provider.
    Media { kind: ArtifactKind, url: String },
    Text { text: String },
    /// Merged output of a parallel group, in declared child order.
    Group { items: Vec<GroupItem> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupItem {
    pub step_id: String,
    pub artifact: Artifact,
}

impl Artifact {
    pub fn media(kind: ArtifactKind, url: impl Into<String>) -> Self {
        Artifact::Media {
            kind,
            url: url.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Artifact::Text { text: text.into() }
    }

    /// Kind of a single artifact; `None` for a group.
    pub fn kind(&self) -> Option<ArtifactKind> {
        match self {
            Artifact::Media { kind, .. } => Some(*kind),
            Artifact::Text { .. } => Some(ArtifactKind::Text),
            Artifact::Group { .. } => None,
        }
    }

    /// Value substituted for a whole-value reference. Groups become an array.
    pub fn reference_value(&self) -> Value {
        match self {
            Artifact::Media { url, .. } => Value::String(url.clone()),
            Artifact::Text { text } => Value::String(text.clone()),
            Artifact::Group { items } => Value::Array(
                items
                    .iter()
                    .map(|item| item.artifact.reference_value())
                    .collect(),
            ),
        }
    }

    /// Text spliced into an interpolated string.
    pub fn interpolation_text(&self) -> String {
        match self {
            Artifact::Media { url, .. } => url.clone(),
            Artifact::Text { text } => text.clone(),
            Artifact::Group { items } => items
                .iter()
                .map(|item| item.artifact.interpolation_text())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
