use serde::{Deserialize, Serialize};

use crate::markup::is_safe_target;

/// The parsed catalog: every resource in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIndex {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ResourceIndex {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Total number of sections across all resources.
    pub fn section_count(&self) -> usize {
        self.resources.iter().map(|r| r.sections.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "third_level_sections",
        alias = "third_level_headings",
        default
    )]
    pub sections: Vec<Section>,
}

impl Resource {
    pub fn new(title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: kind.into(),
            url: None,
            sections: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_section(mut self, title: impl Into<String>, content: impl Into<String>) -> Self {
        self.sections.push(Section::new(title, content));
        self
    }

    /// The URL when it can be linked to: blank and `javascript:` URLs are
    /// treated as absent.
    pub fn link(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.trim().is_empty() && is_safe_target(url))
    }
}

/// A third-level heading and the text beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}
