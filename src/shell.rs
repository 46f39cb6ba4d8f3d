//! Presentation shells: the modal search dialog and the inline card filter.
//!
//! Both keep their page state in an explicit struct owned by the shell and
//! accept the same [`ShellEvent`]s.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tracing::debug;

use crate::data::ResourceIndex;
use crate::loader::{IndexLoader, LoadError};
use crate::matcher::{CardDeck, Query, ResourceCard, match_query};
use crate::render::{render, render_error, render_no_results, render_searching};

pub const QUERY_PARAM: &str = "q";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// A search button was pressed; submits the current input.
    ButtonClick,
    KeyPress { key: String },
    Input(String),
    Click(ClickTarget),
    PageLoad { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Backdrop,
    CloseControl,
    Content,
}

/// Open/closed state of the single results overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalState {
    open: bool,
    scroll_locked: bool,
}

impl ModalState {
    pub fn open(&mut self) {
        self.open = true;
        self.scroll_locked = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.scroll_locked = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether page scrolling behind the overlay is suppressed.
    pub fn is_scroll_locked(&self) -> bool {
        self.scroll_locked
    }
}

/// Identifies one submitted search. Only the most recent ticket may publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    token: u64,
    query: Query,
}

impl SearchTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

}

/// A deep-link search waiting for its grace delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSearch {
    pub query: String,
    pub delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SearchSessionState {
    pub input: String,
    /// Markup of the results container.
    pub results: String,
    pub modal: ModalState,
    latest_token: u64,
}

impl SearchSessionState {
    pub fn latest_token(&self) -> u64 {
        self.latest_token
    }
}

/// Modal variant: fetch the index, render into the results container, open
/// the overlay.
#[derive(Debug)]
pub struct SearchSession<L> {
    loader: L,
    deep_link_delay: Duration,
    state: SearchSessionState,
}

impl<L: IndexLoader> SearchSession<L> {
    pub fn new(loader: L, deep_link_delay: Duration) -> Self {
        Self {
            loader,
            deep_link_delay,
            state: SearchSessionState::default(),
        }
    }

    pub fn state(&self) -> &SearchSessionState {
        &self.state
    }

    /// Starts a search. Blank input leaves every piece of state untouched.
    pub fn submit(&mut self, raw: &str) -> Option<SearchTicket> {
        let query = Query::parse(raw)?;
        self.state.latest_token += 1;
        self.state.results = render_searching();
        debug!(token = self.state.latest_token, query = query.as_str(), "Search submitted");
        Some(SearchTicket {
            token: self.state.latest_token,
            query,
        })
    }

    /// Publishes the outcome of `ticket`. Returns `false` when a newer search
    /// has been submitted since, in which case nothing changes.
    pub fn complete(
        &mut self,
        ticket: SearchTicket,
        outcome: Result<ResourceIndex, LoadError>,
    ) -> bool {
        if ticket.token != self.state.latest_token {
            debug!(
                token = ticket.token,
                latest = self.state.latest_token,
                "Discarding superseded search"
            );
            return false;
        }
        self.state.results = match outcome {
            Ok(index) => {
                let groups = match_query(&ticket.query, &index);
                render(&groups, &ticket.query)
            }
            Err(err) => render_error(&err),
        };
        self.state.modal.open();
        true
    }

    pub async fn search(&mut self, raw: &str) -> bool {
        let Some(ticket) = self.submit(raw) else {
            return false;
        };
        let outcome = self.loader.load().await;
        self.complete(ticket, outcome)
    }

    /// Pre-fills the input from a `q` parameter, if `url` carries one.
    pub fn deep_link(&mut self, url: &str) -> Option<PendingSearch> {
        let query = deep_link_query(url)?;
        self.state.input = query.clone();
        Some(PendingSearch {
            query,
            delay: self.deep_link_delay,
        })
    }

    /// Page-load entry point: waits out the grace delay, then searches.
    pub async fn open_deep_link(&mut self, url: &str) -> bool {
        let Some(pending) = self.deep_link(url) else {
            return false;
        };
        tokio::time::sleep(pending.delay).await;
        self.search(&pending.query).await
    }

    pub async fn dispatch(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::ButtonClick => {
                let value = self.state.input.clone();
                self.search(&value).await;
            }
            ShellEvent::KeyPress { key } if key == "Enter" => {
                let value = self.state.input.clone();
                self.search(&value).await;
            }
            ShellEvent::KeyPress { .. } => {}
            ShellEvent::Input(value) => self.state.input = value,
            ShellEvent::Click(ClickTarget::Backdrop | ClickTarget::CloseControl) => {
                self.state.modal.close();
            }
            ShellEvent::Click(ClickTarget::Content) => {}
            ShellEvent::PageLoad { url } => {
                self.open_deep_link(&url).await;
            }
        }
    }
}

/// The shared "no results" node of the inline variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoResultsPlaceholder {
    pub markup: String,
    pub visible: bool,
}

/// Inline variant: shows matching cards, hides the rest.
#[derive(Debug, Clone)]
pub struct InlineShell {
    deck: CardDeck,
    visible: Vec<bool>,
    placeholder: Option<NoResultsPlaceholder>,
    input: String,
    deep_link_delay: Duration,
}

impl InlineShell {
    pub fn new(deck: CardDeck, deep_link_delay: Duration) -> Self {
        let visible = vec![true; deck.len()];
        Self {
            deck,
            visible,
            placeholder: None,
            input: String::new(),
            deep_link_delay,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn deck(&self) -> &CardDeck {
        &self.deck
    }

    pub fn is_visible(&self, position: usize) -> bool {
        self.visible.get(position).copied().unwrap_or(false)
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &ResourceCard> + '_ {
        self.deck
            .cards()
            .iter()
            .zip(&self.visible)
            .filter(|(_, shown)| **shown)
            .map(|(card, _)| card)
    }

    pub fn placeholder(&self) -> Option<&NoResultsPlaceholder> {
        self.placeholder.as_ref()
    }

    /// Filters the cards. Blank input is ignored.
    pub fn apply(&mut self, raw: &str) -> bool {
        let Some(query) = Query::parse(raw) else {
            return false;
        };
        let groups = match_query(&query, &self.deck);
        self.visible.iter_mut().for_each(|shown| *shown = false);
        for group in &groups {
            self.visible[group.position] = true;
        }
        if groups.is_empty() {
            let markup = render_no_results(&query);
            let placeholder = self.placeholder.get_or_insert_with(|| NoResultsPlaceholder {
                markup: String::new(),
                visible: false,
            });
            placeholder.markup = markup;
            placeholder.visible = true;
        } else if let Some(placeholder) = self.placeholder.as_mut() {
            placeholder.visible = false;
        }
        debug!(query = query.as_str(), shown = groups.len(), "Cards filtered");
        true
    }

    pub fn deep_link(&mut self, url: &str) -> Option<PendingSearch> {
        let query = deep_link_query(url)?;
        self.input = query.clone();
        Some(PendingSearch {
            query,
            delay: self.deep_link_delay,
        })
    }

    pub async fn open_deep_link(&mut self, url: &str) -> bool {
        let Some(pending) = self.deep_link(url) else {
            return false;
        };
        tokio::time::sleep(pending.delay).await;
        self.apply(&pending.query)
    }

    pub async fn dispatch(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Input(value) => {
                self.input = value;
                let value = self.input.clone();
                self.apply(&value);
            }
            ShellEvent::ButtonClick => {
                let value = self.input.clone();
                self.apply(&value);
            }
            ShellEvent::KeyPress { key } if key == "Enter" => {
                let value = self.input.clone();
                self.apply(&value);
            }
            ShellEvent::KeyPress { .. } | ShellEvent::Click(_) => {}
            ShellEvent::PageLoad { url } => {
                self.open_deep_link(&url).await;
            }
        }
    }
}

/// Extracts the `q` parameter from a URL, path-and-query, or bare query
/// string. Returns `None` when absent or empty.
pub fn deep_link_query(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let query_string = match without_fragment.split_once('?') {
        Some((_, qs)) => qs,
        None if without_fragment.contains('=') => without_fragment,
        None => return None,
    };
    query_string
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key) == QUERY_PARAM).then(|| decode_component(value))
        })
        .find(|value| !value.is_empty())
}

/// Builds `path?q=<term>` for linking straight into results.
pub fn deep_link_url(path: &str, query: &str) -> String {
    format!("{path}?{QUERY_PARAM}={}", encode_component(query))
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn decode_component(value: &str) -> String {
    percent_decode_str(&value.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Resource;
    use crate::loader::StaticLoader;

    fn scenario_index() -> ResourceIndex {
        ResourceIndex::new(vec![
            Resource::new("A", "doc").with_section("Intro", "hello world"),
            Resource::new("B", "doc").with_section("X", "nothing"),
            Resource::new("C", "video").with_section("Foo bar", "foo fighters"),
        ])
    }

    fn session() -> SearchSession<StaticLoader> {
        SearchSession::new(StaticLoader::new(scenario_index()), Duration::ZERO)
    }

    #[test]
    fn parses_deep_link_parameter() {
        assert_eq!(deep_link_query("/search?q=foo").as_deref(), Some("foo"));
        assert_eq!(
            deep_link_query("https://site.example/search?lang=en&q=hello%20world#top").as_deref(),
            Some("hello world")
        );
        assert_eq!(deep_link_query("q=a+b").as_deref(), Some("a b"));
        assert_eq!(deep_link_query("/search?q=%E4%B8%AD").as_deref(), Some("中"));
        assert_eq!(deep_link_query("/search?q="), None);
        assert_eq!(deep_link_query("/search?query=foo"), None);
        assert_eq!(deep_link_query("/search"), None);
    }

    #[test]
    fn deep_link_url_round_trips() {
        let url = deep_link_url("/search", "c++ & rust?");
        assert_eq!(deep_link_query(&url).as_deref(), Some("c++ & rust?"));
    }

    #[test]
    fn modal_open_close_toggles_scroll_lock() {
        let mut modal = ModalState::default();
        assert!(!modal.is_open() && !modal.is_scroll_locked());
        modal.open();
        assert!(modal.is_open() && modal.is_scroll_locked());
        modal.close();
        assert!(!modal.is_open() && !modal.is_scroll_locked());
    }

    #[tokio::test]
    async fn blank_search_changes_nothing() {
        let mut session = session();
        assert!(!session.search("   ").await);
        assert!(session.state().results.is_empty());
        assert!(!session.state().modal.is_open());
        assert_eq!(session.state().latest_token(), 0);
    }

    #[tokio::test]
    async fn search_renders_and_opens_modal() {
        let mut session = session();
        assert!(session.search("hello").await);
        let state = session.state();
        assert!(state.modal.is_open());
        assert!(state.modal.is_scroll_locked());
        assert!(state.results.contains(r#"<span class="search-highlight">hello</span>"#));
    }

    #[tokio::test]
    async fn pending_search_shows_placeholder_then_stale_results_are_dropped() {
        let mut session = session();
        let first = session.submit("hello").unwrap();
        assert!(session.state().results.contains("Searching..."));
        let second = session.submit("foo").unwrap();
        assert!(second.token() > first.token());

        assert!(session.complete(second, Ok(scenario_index())));
        let fresh = session.state().results.clone();
        assert!(fresh.contains("fighters"));

        assert!(!session.complete(first, Ok(scenario_index())));
        assert_eq!(session.state().results, fresh);
    }

    #[tokio::test]
    async fn early_completion_of_old_ticket_is_ignored() {
        let mut session = session();
        let first = session.submit("hello").unwrap();
        let second = session.submit("foo").unwrap();
        assert!(!session.complete(first, Ok(scenario_index())));
        assert!(session.state().results.contains("Searching..."));
        assert!(!session.state().modal.is_open());
        assert!(session.complete(second, Ok(scenario_index())));
        assert!(session.state().results.contains("fighters"));
    }

    #[tokio::test]
    async fn load_failure_is_rendered_inline() {
        let mut session = session();
        let ticket = session.submit("hello").unwrap();
        let err = LoadError::Status {
            status: 404,
            uri: "http://host/data/resources_index.json".into(),
        };
        assert!(session.complete(ticket, Err(err)));
        let results = &session.state().results;
        assert!(results.contains("Something went wrong while searching"));
        assert!(results.contains("404"));
    }

    #[tokio::test]
    async fn events_drive_the_modal() {
        let mut session = session();
        session.dispatch(ShellEvent::Input("zzz".into())).await;
        session
            .dispatch(ShellEvent::KeyPress { key: "a".into() })
            .await;
        assert!(!session.state().modal.is_open());

        session
            .dispatch(ShellEvent::KeyPress { key: "Enter".into() })
            .await;
        assert!(session.state().modal.is_open());
        assert!(session.state().results.contains(r#"No results found for "zzz""#));

        session.dispatch(ShellEvent::Click(ClickTarget::Content)).await;
        assert!(session.state().modal.is_open());
        session.dispatch(ShellEvent::Click(ClickTarget::Backdrop)).await;
        assert!(!session.state().modal.is_open());

        session.dispatch(ShellEvent::Input("hello".into())).await;
        session.dispatch(ShellEvent::ButtonClick).await;
        assert!(session.state().modal.is_open());
        session
            .dispatch(ShellEvent::Click(ClickTarget::CloseControl))
            .await;
        assert!(!session.state().modal.is_open());
        assert!(!session.state().modal.is_scroll_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn deep_link_waits_out_grace_delay() {
        let delay = Duration::from_millis(300);
        let mut session = SearchSession::new(StaticLoader::new(scenario_index()), delay);

        let early = tokio::time::timeout(
            delay - Duration::from_millis(1),
            session.open_deep_link("/search?q=hello"),
        )
        .await;
        assert!(early.is_err());
        assert_eq!(session.state().input, "hello");
        assert!(session.state().results.is_empty());
        assert!(!session.state().modal.is_open());

        let started = tokio::time::Instant::now();
        assert!(session.open_deep_link("/search?q=hello").await);
        assert!(started.elapsed() >= delay);
        assert!(session.state().modal.is_open());
        assert!(session.state().results.contains("search-highlight"));
    }

    #[tokio::test]
    async fn deep_link_matches_typed_search() {
        let mut linked = session();
        linked
            .dispatch(ShellEvent::PageLoad {
                url: "https://site.example/search?q=foo".into(),
            })
            .await;
        assert_eq!(linked.state().input, "foo");

        let mut typed = session();
        typed.dispatch(ShellEvent::Input("foo".into())).await;
        typed
            .dispatch(ShellEvent::KeyPress { key: "Enter".into() })
            .await;

        assert_eq!(linked.state().results, typed.state().results);
        assert!(linked.state().modal.is_open());
    }

    #[test]
    fn deep_link_waits_for_configured_delay() {
        let mut session = SearchSession::new(
            StaticLoader::new(scenario_index()),
            Duration::from_millis(300),
        );
        let pending = session.deep_link("/search?q=hello").unwrap();
        assert_eq!(pending.delay, Duration::from_millis(300));
        assert_eq!(pending.query, "hello");
        assert!(session.state().results.is_empty());
        assert!(session.deep_link("/search").is_none());
    }

    fn inline_shell() -> InlineShell {
        InlineShell::new(CardDeck::from_index(&scenario_index()), Duration::ZERO)
    }

    #[test]
    fn inline_shows_matches_and_hides_the_rest() {
        let mut shell = inline_shell();
        assert_eq!(shell.visible_cards().count(), 3);
        assert!(shell.apply("video"));
        assert!(!shell.is_visible(0));
        assert!(!shell.is_visible(1));
        assert!(shell.is_visible(2));
        assert!(shell.placeholder().is_none());
        assert!(!shell.is_visible(99));
    }

    #[test]
    fn inline_placeholder_is_created_once_and_reused() {
        let mut shell = inline_shell();
        assert!(!shell.apply(""));
        assert_eq!(shell.visible_cards().count(), 3);

        shell.apply("zzz");
        assert_eq!(shell.visible_cards().count(), 0);
        let placeholder = shell.placeholder().unwrap();
        assert!(placeholder.visible);
        assert!(placeholder.markup.contains("zzz"));

        shell.apply("a");
        let placeholder = shell.placeholder().unwrap();
        assert!(!placeholder.visible);

        shell.apply("qqq");
        let placeholder = shell.placeholder().unwrap();
        assert!(placeholder.visible);
        assert!(placeholder.markup.contains("qqq"));
        assert!(!placeholder.markup.contains("zzz"));
    }

    #[tokio::test]
    async fn inline_input_events_filter_and_deep_link_prefills() {
        let mut shell = inline_shell();
        shell.dispatch(ShellEvent::Input("doc".into())).await;
        assert_eq!(shell.visible_cards().count(), 2);

        shell.dispatch(ShellEvent::Input(String::new())).await;
        assert_eq!(shell.visible_cards().count(), 2);

        let mut linked = inline_shell();
        linked
            .dispatch(ShellEvent::PageLoad {
                url: "/catalog?q=video".into(),
            })
            .await;
        assert_eq!(linked.input(), "video");
        let titles: Vec<_> = linked.visible_cards().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C"]);
    }
}
