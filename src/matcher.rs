use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Resource, ResourceIndex, Section};

/// Case-insensitive normalization applied to both sides of a comparison.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// A trimmed, non-empty search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    folded: String,
}

impl Query {
    /// Returns `None` for blank input; blank searches are never run.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            folded: fold(text),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }

    fn is_found_in(&self, haystack: &str) -> bool {
        fold(haystack).contains(&self.folded)
    }
}

/// Anything that can present itself as an ordered list of resources.
pub trait Corpus {
    fn resources(&self) -> &[Resource];
}

impl Corpus for ResourceIndex {
    fn resources(&self) -> &[Resource] {
        &self.resources
    }
}

impl Corpus for [Resource] {
    fn resources(&self) -> &[Resource] {
        self
    }
}

/// A rendered card as the inline catalog shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCard {
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Card snapshot adapted to the resource shape: one section per card,
/// headed by the card title with the status as its body.
#[derive(Debug, Clone, Default)]
pub struct CardDeck {
    cards: Vec<ResourceCard>,
    view: Vec<Resource>,
}

impl CardDeck {
    pub fn new(cards: Vec<ResourceCard>) -> Self {
        let view = cards
            .iter()
            .map(|card| Resource {
                title: card.title.clone(),
                kind: card.status.clone(),
                url: card.href.clone(),
                sections: vec![Section::new(card.title.clone(), card.status.clone())],
            })
            .collect();
        Self { cards, view }
    }

    pub fn from_index(index: &ResourceIndex) -> Self {
        Self::new(
            index
                .resources
                .iter()
                .map(|resource| ResourceCard {
                    title: resource.title.clone(),
                    status: resource.kind.clone(),
                    href: resource.link().map(str::to_owned),
                })
                .collect(),
        )
    }

    pub fn cards(&self) -> &[ResourceCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Corpus for CardDeck {
    fn resources(&self) -> &[Resource] {
        &self.view
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionMatch<'a> {
    pub index: usize,
    pub section: &'a Section,
}

/// Matched sections of one resource, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup<'a> {
    /// Position of the resource within its corpus.
    pub position: usize,
    pub resource: &'a Resource,
    pub sections: Vec<SectionMatch<'a>>,
}

impl MatchGroup<'_> {
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

/// Every resource with at least one section whose title or content contains
/// the query, in corpus order.
pub fn match_query<'a, C>(query: &Query, corpus: &'a C) -> Vec<MatchGroup<'a>>
where
    C: Corpus + ?Sized,
{
    let groups: Vec<MatchGroup<'a>> = corpus
        .resources()
        .iter()
        .enumerate()
        .filter_map(|(position, resource)| {
            let sections: Vec<SectionMatch<'a>> = resource
                .sections
                .iter()
                .enumerate()
                .filter(|(_, section)| {
                    query.is_found_in(&section.title) || query.is_found_in(&section.content)
                })
                .map(|(index, section)| SectionMatch { index, section })
                .collect();
            if sections.is_empty() {
                None
            } else {
                Some(MatchGroup {
                    position,
                    resource,
                    sections,
                })
            }
        })
        .collect();
    debug!(
        query = query.as_str(),
        groups = groups.len(),
        sections = groups.iter().map(MatchGroup::section_count).sum::<usize>(),
        "Matched query"
    );
    groups
}
