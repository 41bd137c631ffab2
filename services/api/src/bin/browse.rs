//! services/api/src/bin/browse.rs
//!
//! A terminal client for the story feed. It drives a `StoryFeedController`
//! straight against the database and renders every settled feed state.
//!
//! Commands:
//!   region <text> | category <text> | search <text>   debounced filter change
//!   tag <name>                                        debounced tag filter
//!   clear                                             drop all filters
//!   now <text>                                        search without debounce
//!   more                                              load the next page
//!   fav <id>                                          toggle a favorite
//!   login <email> <password> | logout
//!   show | quit

use api_lib::{adapters::db::DbAdapter, config::Config, error::ApiError, web::auth::verify_password};
use folktale_core::catalog::{category_display_name, region_display_name};
use folktale_core::ports::AccountStore;
use folktale_core::{
    FeedSnapshot, FeedStatus, FilterUpdate, LocalSession, StoryFeedController, User,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn render(snapshot: &FeedSnapshot) {
    match snapshot.status {
        FeedStatus::Idle => println!("(nothing loaded yet)"),
        FeedStatus::Loading => println!("loading..."),
        FeedStatus::Empty => println!("No stories match."),
        FeedStatus::Failed | FeedStatus::Ready => {
            for story in &snapshot.stories {
                let marker = if snapshot.is_favorite(story.id) { '*' } else { ' ' };
                println!(
                    "{} [{}] {} ({}, {})",
                    marker,
                    story.id,
                    story.title,
                    region_display_name(story.region.as_deref()),
                    category_display_name(story.category.as_deref()),
                );
            }
            if let Some(message) = &snapshot.error {
                println!("! {}", message);
            } else if snapshot.has_more {
                println!("-- page {}, type 'more' for the next --", snapshot.current_page + 1);
            } else {
                println!("-- end of stories --");
            }
        }
    }
}

async fn login(
    accounts: &DbAdapter,
    session: &LocalSession,
    email: &str,
    password: &str,
) -> Result<(), String> {
    let creds = accounts
        .get_user_by_email(email)
        .await
        .map_err(|_| "Invalid email or password".to_string())?;
    if !verify_password(password, &creds.hashed_password) {
        return Err("Invalid email or password".to_string());
    }
    session.sign_in(User {
        user_id: creds.user_id,
        email: Some(creds.email),
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let db = Arc::new(DbAdapter::new(db_pool));
    let session = Arc::new(LocalSession::signed_out());

    let feed = StoryFeedController::with_config(
        db.clone(),
        db.clone(),
        session.clone(),
        config.feed_config(),
    )?;
    let session_watcher = feed.watch_session();

    let shutdown = CancellationToken::new();

    // Renders each settled state; debounced reloads land here.
    let mut updates = feed.subscribe();
    let render_token = shutdown.clone();
    let renderer = tokio::spawn(async move {
        let mut last_rendered: Option<FeedSnapshot> = None;
        loop {
            tokio::select! {
                _ = render_token.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    if snapshot.is_loading || last_rendered.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    render(&snapshot);
                    last_rendered = Some(snapshot);
                }
            }
        }
    });

    if let Err(e) = feed.reload().await {
        warn!("Initial load failed: {}", e);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "region" => feed.set_filter(FilterUpdate::default().region(rest)),
            "category" => feed.set_filter(FilterUpdate::default().category(rest)),
            "search" => feed.set_filter(FilterUpdate::default().search(rest)),
            "tag" => feed.set_filter(FilterUpdate::default().tag(rest)),
            "clear" => feed.set_filter(FilterUpdate::clear_all()),
            "now" => {
                if let Err(e) = feed.apply_filter_now(FilterUpdate::default().search(rest)).await {
                    warn!("Search failed: {}", e);
                }
            }
            "more" => {
                if let Err(e) = feed.load_more().await {
                    warn!("Loading more failed: {}", e);
                }
            }
            "fav" => match rest.parse() {
                Ok(story_id) => match feed.toggle_favorite(story_id).await {
                    Ok(true) => println!("Added {} to favorites.", story_id),
                    Ok(false) => println!("Removed {} from favorites.", story_id),
                    Err(e) => println!("Could not update favorites: {}", e),
                },
                Err(_) => println!("usage: fav <story id>"),
            },
            "login" => match rest.split_once(' ') {
                Some((email, password)) => {
                    match login(&db, &session, email.trim(), password.trim()).await {
                        Ok(()) => println!("Signed in as {}.", email.trim()),
                        Err(message) => println!("{}", message),
                    }
                }
                None => println!("usage: login <email> <password>"),
            },
            "logout" => {
                session.sign_out();
                println!("Signed out.");
            }
            "show" => render(&feed.snapshot()),
            "quit" | "exit" => break,
            other => println!("Unknown command '{}'", other),
        }
    }

    info!("Closing the feed.");
    shutdown.cancel();
    session_watcher.abort();
    if let Err(e) = renderer.await {
        error!("Renderer task failed: {}", e);
    }
    Ok(())
}
