mod config;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    session::StoredSession, ApiClient, Blogs, Categories, Contacts, DeleteConfirmation, Events,
    Gallery, GeminiGenerator, HttpGateway, ListController, ListStatus, MutationCoordinator,
    MutationIntent, MutationOutcome, NotificationSink, OpportunitySuggester, Resource,
    ResourceGateway, SessionGuard, SessionStore, SuggestionPanel, SuggestionState, TeamMembers,
    Toast, ToastLevel, Volunteers,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::Entity,
    protocol::{ListQuery, SortOrder},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "ngo-admin", about = "Manage the nonprofit site's content from a terminal")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResourceKind {
    Blogs,
    Volunteers,
    TeamMembers,
    Events,
    Gallery,
    Categories,
    Contacts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session token.
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    List {
        resource: ResourceKind,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        /// `key=value`, repeatable.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        sort: Option<SortOrder>,
    },
    Show {
        resource: ResourceKind,
        id: String,
    },
    /// Create an entity from a JSON payload file.
    Create {
        resource: ResourceKind,
        #[arg(long)]
        file: PathBuf,
    },
    Update {
        resource: ResourceKind,
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    Delete {
        resource: ResourceKind,
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Flip the entity's active/contacted flag.
    Toggle {
        resource: ResourceKind,
        id: String,
    },
    /// Active categories, as offered when picking a blog or event category.
    ActiveCategories {
        #[arg(long)]
        search: Option<String>,
    },
    UploadImage {
        path: PathBuf,
        #[arg(long)]
        mime: Option<String>,
    },
    /// Suggest volunteer opportunities for a contact message.
    Suggest {
        message: Option<String>,
        #[arg(long, conflicts_with = "message")]
        contact: Option<String>,
    },
}

#[derive(Debug)]
enum ResourceAction {
    List {
        page: u32,
        search: Option<String>,
        filters: Vec<(String, String)>,
        sort: Option<SortOrder>,
    },
    Show(String),
    Create(PathBuf),
    Update(String, PathBuf),
    Delete { id: String, yes: bool },
    Toggle(String),
}

/// Prints toasts to stderr so command output stays pipeable.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, toast: Toast) {
        let marker = match toast.level {
            ToastLevel::Success => "ok",
            ToastLevel::Error => "error",
        };
        eprintln!("[{marker}] {}: {}", toast.title, toast.description);
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing filter key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn page_offset(page: u32, page_size: u32) -> Result<u32> {
    page.saturating_sub(1)
        .checked_mul(page_size)
        .with_context(|| format!("page {page} is out of range"))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn prompt(question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let settings = load_settings(&cli.config);
    let store = Arc::new(SessionStore::load(&settings.session_file)?);
    let api = ApiClient::new(settings.api_base_url.clone(), store.clone())?
        .with_timeout(settings.request_timeout())?;
    info!(base_url = api.base_url(), "configured backend");

    match cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ").await?,
            };
            let response = api.login(&email, &password).await?;
            store.save(StoredSession {
                access_token: response.access_token,
                refresh_token: response.refresh_token,
                user_email: Some(response.user.email.clone()),
            })?;
            println!("signed in as {} <{}>", response.user.name, response.user.email);
        }
        Command::Logout => {
            store.clear()?;
            println!("signed out");
        }
        Command::UploadImage { path, mime } => {
            SessionGuard::require(store.as_ref())?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            let mime = mime.unwrap_or_else(|| guess_mime(&path).to_string());
            let uploaded = api.upload_image(bytes, &filename, &mime).await?;
            println!("uploaded image_id={} url={}", uploaded.id, uploaded.url);
        }
        Command::ActiveCategories { search } => {
            SessionGuard::require(store.as_ref())?;
            let gateway = HttpGateway::<Categories>::new(api.clone());
            let active = gateway
                .list_active(search.as_deref().unwrap_or_default())
                .await?;
            for category in &active.items {
                println!("{}\t{}", category.id(), category.label());
            }
            println!("{} active", active.total_count);
        }
        Command::Suggest { message, contact } => {
            SessionGuard::require(store.as_ref())?;
            suggest(&settings, &api, message, contact).await?;
        }
        Command::List {
            resource,
            page,
            search,
            filters,
            sort,
        } => {
            let action = ResourceAction::List {
                page,
                search,
                filters,
                sort,
            };
            run_resource(resource, action, &api, store.as_ref()).await?;
        }
        Command::Show { resource, id } => {
            run_resource(resource, ResourceAction::Show(id), &api, store.as_ref()).await?;
        }
        Command::Create { resource, file } => {
            run_resource(resource, ResourceAction::Create(file), &api, store.as_ref()).await?;
        }
        Command::Update { resource, id, file } => {
            let action = ResourceAction::Update(id, file);
            run_resource(resource, action, &api, store.as_ref()).await?;
        }
        Command::Delete { resource, id, yes } => {
            let action = ResourceAction::Delete { id, yes };
            run_resource(resource, action, &api, store.as_ref()).await?;
        }
        Command::Toggle { resource, id } => {
            run_resource(resource, ResourceAction::Toggle(id), &api, store.as_ref()).await?;
        }
    }

    Ok(())
}

async fn run_resource(
    kind: ResourceKind,
    action: ResourceAction,
    api: &ApiClient,
    store: &SessionStore,
) -> Result<()> {
    SessionGuard::require(store)?;
    let api = api.clone();
    match kind {
        ResourceKind::Blogs => run::<Blogs>(action, api).await,
        ResourceKind::Volunteers => run::<Volunteers>(action, api).await,
        ResourceKind::TeamMembers => run::<TeamMembers>(action, api).await,
        ResourceKind::Events => run::<Events>(action, api).await,
        ResourceKind::Gallery => run::<Gallery>(action, api).await,
        ResourceKind::Categories => run::<Categories>(action, api).await,
        ResourceKind::Contacts => run::<Contacts>(action, api).await,
    }
}

async fn run<R>(action: ResourceAction, api: ApiClient) -> Result<()>
where
    R: Resource,
    R::Entity: Serialize,
    R::Payload: DeserializeOwned,
{
    let notifier: Arc<dyn NotificationSink> = Arc::new(ConsoleSink);
    let gateway: Arc<dyn ResourceGateway<R>> = Arc::new(HttpGateway::<R>::new(api));
    let mutations = MutationCoordinator::new(gateway.clone(), notifier.clone());

    match action {
        ResourceAction::List {
            page,
            search,
            filters,
            sort,
        } => {
            let offset = page_offset(page, R::PAGE_SIZE)?;
            let mut query = ListQuery::new(R::PAGE_SIZE).with_offset(offset);
            if let Some(search) = search {
                query = query.with_search(search);
            }
            if let Some(sort) = sort {
                query = query.with_sort(sort);
            }
            for (key, value) in filters {
                if !R::FILTER_KEYS.contains(&key.as_str()) {
                    bail!(
                        "{} lists cannot be filtered by '{key}' (supported: {})",
                        R::NAME,
                        R::FILTER_KEYS.join(", ")
                    );
                }
                query = query.with_filter(key, value);
            }

            let list = ListController::with_query(gateway, notifier, query);
            let snapshot = list.load().await;
            if let ListStatus::Error(err) = &snapshot.status {
                bail!("failed to load {} list: {}", R::NAME, err.message);
            }
            if snapshot.items.is_empty() {
                println!("no results");
            }
            for item in &snapshot.items {
                println!("{}\t{}", item.id(), item.label());
            }
            println!(
                "page {} of {} ({} total)",
                snapshot.page(),
                snapshot.total_pages().max(1),
                snapshot.total_count
            );
        }
        ResourceAction::Show(id) => {
            let entity = gateway.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&entity)?);
        }
        ResourceAction::Create(file) => {
            let payload = read_payload::<R::Payload>(&file).await?;
            let outcome = mutations.execute(MutationIntent::Create(payload)).await?;
            print_outcome(&outcome);
        }
        ResourceAction::Update(id, file) => {
            let payload = read_payload::<R::Payload>(&file).await?;
            let outcome = mutations
                .execute(MutationIntent::Update { id, payload })
                .await?;
            print_outcome(&outcome);
        }
        ResourceAction::Delete { id, yes } => {
            let mut flow = DeleteConfirmation::default();
            flow.request(id.clone());
            if !yes {
                let answer = prompt(&format!("Delete {} {id}? [y/N] ", R::NAME)).await?;
                if !matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
                    flow.cancel();
                    println!("cancelled");
                    return Ok(());
                }
            }
            let Some(confirmed) = flow.confirm() else {
                bail!("no delete pending for {id}");
            };
            let outcome = mutations.execute(MutationIntent::Delete(confirmed)).await?;
            print_outcome(&outcome);
        }
        ResourceAction::Toggle(id) => {
            let current = find_entity::<R>(gateway.as_ref(), &id).await?;
            let intent = MutationIntent::toggle(&current)?;
            let outcome = mutations.execute(intent).await?;
            print_outcome(&outcome);
        }
    }
    Ok(())
}

/// Resolves one entity, scanning list pages when the backend has no
/// single-item route.
async fn find_entity<R: Resource>(
    gateway: &dyn ResourceGateway<R>,
    id: &str,
) -> Result<R::Entity> {
    if R::routes().get.is_some() {
        return Ok(gateway.get(id).await?);
    }
    let mut query = ListQuery::new(50);
    loop {
        let page = gateway.list(&query).await?;
        if let Some(found) = page.items.iter().find(|item| item.id() == id) {
            return Ok(found.clone());
        }
        let next = query.offset + query.limit;
        if page.items.is_empty() || u64::from(next) >= page.total_count {
            bail!("{} {id} not found", R::NAME);
        }
        query = query.with_offset(next);
    }
}

async fn read_payload<T: DeserializeOwned>(file: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read '{}'", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid payload in '{}'", file.display()))
}

fn print_outcome<E: Entity>(outcome: &MutationOutcome<E>) {
    match outcome {
        MutationOutcome::Created(Some(entity)) | MutationOutcome::Updated(Some(entity)) => {
            println!("{}\t{}", entity.id(), entity.label());
        }
        MutationOutcome::Created(None) => println!("created"),
        MutationOutcome::Updated(None) => println!("updated"),
        MutationOutcome::Deleted(id) => println!("deleted {id}"),
    }
}

async fn suggest(
    settings: &Settings,
    api: &ApiClient,
    message: Option<String>,
    contact: Option<String>,
) -> Result<()> {
    let Some(api_key) = settings.gemini_api_key.clone() else {
        bail!("no Gemini API key configured; set APP__GEMINI_API_KEY");
    };

    let message = match (message, contact) {
        (Some(message), _) => message,
        (None, Some(id)) => {
            let gateway = HttpGateway::<Contacts>::new(api.clone());
            find_entity::<Contacts>(&gateway, &id).await?.message
        }
        (None, None) => bail!("pass a message or --contact <id>"),
    };

    let mut generator = GeminiGenerator::new(api_key, settings.gemini_model.clone())
        .with_timeout(settings.request_timeout())?;
    if let Some(base_url) = &settings.gemini_base_url {
        generator = generator.with_base_url(base_url.clone());
    }
    let panel = SuggestionPanel::new(
        OpportunitySuggester::new(Arc::new(generator)),
        Arc::new(ConsoleSink),
    );

    match panel.generate(&message).await {
        SuggestionState::Ready(suggestions) => {
            for (index, suggestion) in suggestions.iter().enumerate() {
                println!("{}. {suggestion}", index + 1);
            }
            Ok(())
        }
        SuggestionState::Failed(err) => bail!("{}", err.message),
        other => bail!("suggestion did not complete: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn filter_arguments_split_on_first_equals() {
        assert_eq!(
            parse_filter("memberType=Key Member"),
            Ok(("memberType".to_string(), "Key Member".to_string()))
        );
        assert_eq!(
            parse_filter("category=a=b"),
            Ok(("category".to_string(), "a=b".to_string()))
        );
        assert!(parse_filter("category").is_err());
        assert!(parse_filter("=News").is_err());
    }

    #[test]
    fn resource_names_are_kebab_case() {
        let cli = Cli::try_parse_from(["ngo-admin", "list", "team-members", "--sort", "title-asc"])
            .expect("parse");
        match cli.command {
            Command::List { resource, sort, .. } => {
                assert!(matches!(resource, ResourceKind::TeamMembers));
                assert_eq!(sort, Some(SortOrder::TitleAsc));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn suggest_rejects_message_with_contact() {
        assert!(
            Cli::try_parse_from(["ngo-admin", "suggest", "hello", "--contact", "ct1"]).is_err()
        );
    }

    #[test]
    fn page_offset_rejects_overflowing_pages() {
        assert_eq!(page_offset(1, 6).expect("first page"), 0);
        assert_eq!(page_offset(0, 6).expect("page zero"), 0);
        assert_eq!(page_offset(3, 10).expect("third page"), 20);
        assert!(page_offset(u32::MAX, 6).is_err());
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(guess_mime(Path::new("logo.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("notes")), "application/octet-stream");
    }
}
