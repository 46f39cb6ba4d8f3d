use askama::Template;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::markup::{Highlighter, escape_html};
use crate::matcher::{MatchGroup, Query};

pub const SEARCHING_PLACEHOLDER: &str = r#"<div class="no-search-results">Searching...</div>"#;

/// Markup for one search: grouped, sorted and highlighted results, or the
/// no-results placeholder.
pub fn render(groups: &[MatchGroup<'_>], query: &Query) -> String {
    if groups.is_empty() {
        return render_no_results(query);
    }
    let highlighter = match Highlighter::new(query) {
        Ok(highlighter) => highlighter,
        Err(err) => {
            warn!(query = query.as_str(), error = %err, "Highlight pattern rejected");
            return render_no_results(query);
        }
    };
    let groups = sorted_by_title(groups)
        .into_iter()
        .map(|group| GroupView {
            title_html: highlighter.highlight(&group.resource.title),
            kind: &group.resource.kind,
            items: group
                .sections
                .iter()
                .map(|hit| ItemView {
                    title_html: highlighter.highlight(&hit.section.title),
                    content_html: highlighter.highlight_markdown(&hit.section.content),
                    url: group.resource.link(),
                })
                .collect(),
        })
        .collect();
    ResultsTemplate { groups }
        .render()
        .unwrap_or_else(|err| render_failure(err.to_string()))
}

pub fn render_no_results(query: &Query) -> String {
    NoResultsTemplate {
        query: query.as_str(),
    }
    .render()
    .unwrap_or_else(|err| render_failure(err.to_string()))
}

pub fn render_searching() -> String {
    SEARCHING_PLACEHOLDER.to_string()
}

/// Inline failure message carrying the error detail.
pub fn render_error(err: &dyn std::error::Error) -> String {
    render_failure(err.to_string())
}

fn render_failure(message: String) -> String {
    format!(
        r#"<div class="no-search-results"><p>Something went wrong while searching</p><p>{}</p></div>"#,
        escape_html(&message)
    )
}

/// Groups in display order: resource title ascending, ties kept in corpus order.
pub fn sorted_by_title<'g, 'a>(groups: &'g [MatchGroup<'a>]) -> Vec<&'g MatchGroup<'a>> {
    let mut ordered: Vec<&MatchGroup<'a>> = groups.iter().collect();
    ordered.sort_by(|a, b| a.resource.title.cmp(&b.resource.title));
    ordered
}

struct GroupView<'a> {
    title_html: String,
    kind: &'a str,
    items: Vec<ItemView<'a>>,
}

struct ItemView<'a> {
    title_html: String,
    content_html: String,
    url: Option<&'a str>,
}

#[derive(Template)]
#[template(
    source = r#"{% for group in groups %}<div class="search-result-group">
  <div class="search-result-group-header">
    {{ group.title_html|safe }}{% if !group.kind.is_empty() %}
    <span class="search-result-type">({{ group.kind }})</span>{% endif %}
  </div>
  {% for item in group.items %}<div class="search-result-item">
    <h4 class="search-result-heading">{{ item.title_html|safe }}</h4>
    <div class="search-result-content">{{ item.content_html|safe }}</div>
    {% if item.url.is_some() %}<a href="{{ item.url.unwrap() }}" target="_blank" rel="noopener" class="search-result-link">View source</a>{% endif %}
  </div>
  {% endfor %}</div>
{% endfor %}"#,
    ext = "html"
)]
struct ResultsTemplate<'a> {
    groups: Vec<GroupView<'a>>,
}

#[derive(Template)]
#[template(
    source = r#"<div class="no-search-results">
  <p>No results found for "{{ query }}"</p>
  <p>Try other keywords</p>
</div>"#,
    ext = "html"
)]
struct NoResultsTemplate<'a> {
    query: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport {
    pub index: usize,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub sections: Vec<SectionReport>,
}

/// Serialisable view of one search, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchReport {
    pub query: String,
    pub total_groups: usize,
    pub total_sections: usize,
    pub groups: Vec<GroupReport>,
}

impl SearchReport {
    pub fn new(query: &Query, groups: &[MatchGroup<'_>]) -> Self {
        let groups: Vec<GroupReport> = sorted_by_title(groups)
            .into_iter()
            .map(|group| GroupReport {
                title: group.resource.title.clone(),
                kind: group.resource.kind.clone(),
                url: group.resource.link().map(str::to_string),
                sections: group
                    .sections
                    .iter()
                    .map(|hit| SectionReport {
                        index: hit.index,
                        title: hit.section.title.clone(),
                        content: hit.section.content.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            query: query.as_str().to_string(),
            total_groups: groups.len(),
            total_sections: groups.iter().map(|g| g.sections.len()).sum(),
            groups,
        }
    }
}
