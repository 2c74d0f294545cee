use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use housing_concierge::catalog::{Catalog, InMemoryCatalog};
use housing_concierge::comparison::EntryId;
use housing_concierge::conversation::ConversationLog;
use housing_concierge::filters::PartialFilterUpdate;
use housing_concierge::nlp::{FilterExtractor, OpenAiNlp, ResponseGenerator};
use housing_concierge::preferences::{InMemoryPreferences, PreferenceStore};
use housing_concierge::remote::ApiClient;
use housing_concierge::{AppConfig, LiveSearch, SearchOrchestrator, Session, SessionContext};

const HELP: &str = "\
Type anything to chat. Commands:
  /live <text>        search as you type (debounced)
  /set <field>=<val>  edit one filter (budget, location, bedrooms, bathrooms, minSize, maxSize, amenities)
  /reset              clear all filters
  /search             search with the current filters
  /compare <id>       add or remove a property from the comparison table
  /uncompare <id>     remove a property from the comparison table
  /clear-compare      empty the comparison table
  /save <id>          save a property to favorites
  /unsave <id>        remove a property from favorites
  /show               print filters, comparison table and favorites
  /quit";

struct Backends {
    catalog: Arc<dyn Catalog>,
    extractor: Arc<dyn FilterExtractor>,
    generator: Arc<dyn ResponseGenerator>,
    preferences: Arc<dyn PreferenceStore>,
}

async fn backends(config: &AppConfig) -> Result<Backends> {
    if let Some(url) = &config.api_url {
        info!("Using property backend at {}", url);
        let api = Arc::new(ApiClient::new(url.as_str(), config.request_timeout())?);
        return Ok(Backends {
            catalog: api.clone(),
            extractor: api.clone(),
            generator: api.clone(),
            preferences: api,
        });
    }

    let Some(api_key) = &config.openai_api_key else {
        bail!("Set PROPERTY_API_URL, or OPENAI_API_KEY to run against the local catalog");
    };

    let catalog = match &config.data_dir {
        Some(dir) => InMemoryCatalog::load_dir(dir).await?,
        None => {
            info!("No data directory configured, using sample listings");
            InMemoryCatalog::sample()
        }
    };
    info!("Catalog holds {} properties", catalog.len());
    let catalog: Arc<dyn Catalog> = Arc::new(catalog.with_limit(config.result_limit));

    let mut nlp = OpenAiNlp::new(
        api_key.as_str(),
        config.openai_model.as_str(),
        config.request_timeout(),
    )
    .context("Failed to create OpenAI client")?;
    if let Some(endpoint) = &config.openai_endpoint {
        info!("Using chat-completions endpoint {}", endpoint);
        nlp = nlp.with_endpoint(endpoint.as_str());
    }
    let nlp = Arc::new(nlp);
    Ok(Backends {
        preferences: Arc::new(InMemoryPreferences::new(catalog.clone())),
        catalog,
        extractor: nlp.clone(),
        generator: nlp,
    })
}

fn parse_id(arg: &str) -> Option<u64> {
    match arg.trim().parse() {
        Ok(id) => Some(id),
        Err(_) => {
            println!("Expected a numeric property id, got {:?}", arg.trim());
            None
        }
    }
}

fn show(session: &Session) {
    let store = session.store();
    println!("Filters: {}", serde_json::to_string(&store.filters()).unwrap_or_default());

    let comparison = store.comparison();
    println!("Comparing {} of 4:", comparison.len());
    for entry in comparison.entries() {
        println!("  [{}] {}", entry.id, entry.snapshot.headline());
    }

    let saved = store.saved();
    println!("Favorites ({}):", saved.len());
    for property in &saved {
        println!("  {}", property.headline());
    }
}

/// Print the conversation lines added since `printed`
fn print_new_messages(log: &ConversationLog, printed: &mut usize) {
    for message in log.messages().iter().skip(*printed) {
        println!("{:>9}: {}", format!("{:?}", message.role).to_lowercase(), message.text);
    }
    *printed = log.len();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    info!("🏠 Housing Concierge");
    let backends = backends(&config).await?;
    let orchestrator = Arc::new(
        SearchOrchestrator::new(
            backends.catalog,
            backends.extractor,
            backends.generator,
            backends.preferences,
        )
        .with_context_window(config.context_window),
    );

    let session = Arc::new(Session::new(SessionContext::anonymous()));
    info!("Session {} for {}", session.context().session_id, session.context().user_id);
    orchestrator.refresh_saved(&session).await;

    let live = LiveSearch::spawn(orchestrator.clone(), session.clone(), config.debounce());

    // Echo every change to the displayed results
    let mut results = session.store().subscribe_results();
    let printer = tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let shown = results.borrow_and_update().clone();
            println!("── {} properties ──", shown.len());
            for property in &shown {
                println!("  {}", property.headline());
            }
        }
    });

    println!("{HELP}");

    // Echo the conversation as it grows
    let mut conversation = session.store().subscribe_conversation();
    let chat = tokio::spawn(async move {
        let mut printed = 0;
        loop {
            print_new_messages(&conversation.borrow_and_update(), &mut printed);
            if conversation.changed().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "/quit" => break,
            "/help" => println!("{HELP}"),
            "/live" => live.update(arg),
            "/set" => {
                let Some((field, value)) = arg.split_once('=') else {
                    println!("Usage: /set <field>=<value>");
                    continue;
                };
                match PartialFilterUpdate::from_assignment(field.trim(), value.trim()) {
                    Ok(update) => {
                        session.store().apply_filter_update(&update);
                    }
                    Err(e) => println!("{e}"),
                }
            }
            "/reset" => session.store().reset_filters(),
            "/search" => {
                if let Err(e) = orchestrator.search(&session, None).await {
                    warn!("Search rejected: {}", e);
                }
            }
            "/compare" => {
                let Some(id) = parse_id(arg) else { continue };
                match orchestrator.find_property(&session, id).await {
                    Ok(property) => {
                        let _ = session.toggle_comparison(property);
                    }
                    Err(e) => println!("{e}"),
                }
            }
            "/uncompare" => {
                let Some(id) = parse_id(arg) else { continue };
                let entry = session
                    .store()
                    .comparison()
                    .entries()
                    .iter()
                    .find(|e| e.snapshot.id == id)
                    .map(|e| e.id.clone())
                    .unwrap_or(EntryId::Catalog(id));
                session.remove_from_comparison(&entry);
            }
            "/clear-compare" => session.clear_comparison(),
            "/save" => {
                if let Some(id) = parse_id(arg) {
                    if !orchestrator.save_property(&session, id).await {
                        println!("Could not save property {id}");
                    }
                }
            }
            "/unsave" => {
                if let Some(id) = parse_id(arg) {
                    if !orchestrator.remove_saved_property(&session, id).await {
                        println!("Could not remove property {id}");
                    }
                }
            }
            "/show" => show(&session),
            _ if command.starts_with('/') => println!("Unknown command {command}, try /help"),
            _ => {
                if let Err(e) = orchestrator.handle_utterance(&session, line).await {
                    warn!("Utterance rejected: {}", e);
                }
            }
        }
    }

    session.close();
    drop(live);
    printer.abort();
    chat.abort();
    info!("Goodbye");
    Ok(())
}
