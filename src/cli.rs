use std::error::Error;
#[cfg(feature = "web")]
use std::net::SocketAddr;
#[cfg(feature = "web")]
use std::time::Duration;

use atty::Stream;
use clap::{Parser, Subcommand};
use resource_search::config::DEFAULT_INDEX_PATH;
use resource_search::render::render_error;
use resource_search::{
    CardDeck, IndexLoader, IndexSource, InlineShell, Query, SearchReport, SourceLoader,
    match_query, render, search_source,
};
#[cfg(feature = "web")]
use resource_search::{SearchConfig, ShellVariant};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "resource-search",
    about = "Search a static resource catalog",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Index document: an http(s) URL or a local path.
    #[arg(long, global = true, default_value = DEFAULT_INDEX_PATH)]
    index: IndexSource,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search section titles and content.
    Search {
        /// Text to look for (case-insensitive substring).
        query: String,
    },
    /// Print the HTML results fragment for a query.
    Render { query: String },
    /// Show which resource cards a query leaves visible.
    Cards { query: String },
    /// Serve the search and catalog pages over HTTP.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Public base URL used for canonical links.
        #[arg(long)]
        base_url: Option<String>,
        /// Presentation shell the home page submits to (`modal` or `inline`).
        #[arg(long, default_value = "modal")]
        variant: ShellVariant,
        /// Delay before a `?q=` deep link searches, in milliseconds.
        #[arg(long, default_value_t = 300)]
        deep_link_delay_ms: u64,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

fn init_tracing(command: &Command) {
    let default_level = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Search { query } => handle_search(&cli.index, &query, cli.json).await,
        Command::Render { query } => handle_render(&cli.index, &query).await,
        Command::Cards { query } => handle_cards(&cli.index, &query, cli.json).await,
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            base_url,
            variant,
            deep_link_delay_ms,
        } => {
            let config = resource_search::web::WebConfig {
                addr,
                base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
                search: SearchConfig {
                    index: cli.index,
                    variant,
                    deep_link_delay: Duration::from_millis(deep_link_delay_ms),
                },
            };
            resource_search::web::serve(config).await?;
            Ok(())
        }
    }
}

fn parse_query(raw: &str) -> Result<Query, Box<dyn Error>> {
    Query::parse(raw).ok_or_else(|| "Search query cannot be empty".into())
}

async fn handle_search(source: &IndexSource, raw: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let query = parse_query(raw)?;
    let report = search_source(source, &query).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn handle_render(source: &IndexSource, raw: &str) -> Result<(), Box<dyn Error>> {
    let query = parse_query(raw)?;
    let markup = match SourceLoader::new(source.clone()).load().await {
        Ok(index) => render(&match_query(&query, &index), &query),
        Err(err) => render_error(&err),
    };
    println!("{markup}");
    Ok(())
}

async fn handle_cards(source: &IndexSource, raw: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let index = SourceLoader::new(source.clone()).load().await?;
    let mut shell = InlineShell::new(CardDeck::from_index(&index), Default::default());
    if !shell.apply(raw) {
        return Err("Search query cannot be empty".into());
    }
    let cards = shell.deck().cards();
    if as_json {
        let payload = json!({
            "query": raw.trim(),
            "cards": cards.iter().enumerate().map(|(position, card)| {
                json!({
                    "title": card.title,
                    "status": card.status,
                    "href": card.href,
                    "visible": shell.is_visible(position),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let width = cards
        .iter()
        .map(|card| card.title.chars().count())
        .max()
        .unwrap_or(5)
        .max("TITLE".len());
    println!("  {:<width$}  {}", "TITLE", "STATUS", width = width);
    println!("  {:-<width$}  {}", "", "------", width = width);
    for (position, card) in cards.iter().enumerate() {
        let marker = if shell.is_visible(position) { '+' } else { ' ' };
        println!("{marker} {:<width$}  {}", card.title, card.status, width = width);
    }
    if shell.visible_cards().next().is_none() {
        println!("\nNo resources match \"{}\". Try other keywords.", raw.trim());
    }
    Ok(())
}

fn print_report(report: &SearchReport) {
    if report.groups.is_empty() {
        println!(
            "No results found for \"{}\". Try other keywords.",
            report.query
        );
        return;
    }
    println!(
        "{} section(s) in {} resource(s) match \"{}\":",
        report.total_sections, report.total_groups, report.query
    );
    for group in &report.groups {
        if group.kind.is_empty() {
            println!("\n{}", group.title);
        } else {
            println!("\n{} ({})", group.title, group.kind);
        }
        if let Some(url) = &group.url {
            println!("  {url}");
        }
        for section in &group.sections {
            println!("\n  [#{}] {}", section.index, section.title);
            render_markdown_block(&section.content);
        }
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        for line in trimmed.lines() {
            println!("    {line}");
        }
    }
}
