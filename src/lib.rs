//! Substring search over a static catalog of resources and their sections,
//! with grouped, highlighted HTML results and two presentation shells.

pub mod config;
mod data;
pub mod loader;
pub mod markup;
pub mod matcher;
pub mod render;
pub mod shell;
#[cfg(feature = "web")]
pub mod web;

pub use config::{IndexSource, SearchConfig, ShellVariant};
pub use data::{Resource, ResourceIndex, Section};
pub use loader::{IndexLoader, LoadError, SourceLoader, StaticLoader, load_index};
pub use matcher::{CardDeck, Corpus, MatchGroup, Query, ResourceCard, SectionMatch, match_query};
pub use render::{SearchReport, render};
pub use shell::{InlineShell, SearchSession, SearchSessionState, ShellEvent};

/// Loads `source` once and runs `query` against it.
pub async fn search_source(source: &IndexSource, query: &Query) -> Result<SearchReport, LoadError> {
    let index = load_index(source).await?;
    let groups = match_query(query, &index);
    Ok(SearchReport::new(query, &groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn bundled_index_is_searchable() {
        let source = IndexSource::File(PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/resources_index.json"
        )));
        let report = search_source(&source, &Query::parse("POLL").unwrap())
            .await
            .unwrap();
        assert_eq!(report.total_groups, 1);
        assert_eq!(report.total_sections, 1);
        assert_eq!(report.groups[0].title, "Async Rust Handbook");
        assert_eq!(report.groups[0].sections[0].title, "Futures and polling");
    }
}
