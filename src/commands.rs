//! The `gator` subcommands.
//!
//! Each subcommand is a thin layer over the stores and the aggregator.
//! Commands that act on behalf of a user resolve the logged-in user from the
//! config first and fail with `Error::Unauthenticated` if there is none.

use std::path::PathBuf;

use clap::Subcommand;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::Error;
use crate::feed::HttpFetcher;
use crate::storage::{Database, Feed, User};
use crate::util::{parse_interval, terminal_line, validate_feed_url};

const DEFAULT_BROWSE_LIMIT: i64 = 2;
const TITLE_WIDTH: usize = 72;
const DESCRIPTION_WIDTH: usize = 160;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the logged-in user
    Login { name: String },
    /// Delete all users, feeds, follows and posts
    Reset,
    /// List registered users
    Users,
    /// Poll feeds forever, one per interval (e.g. 30s, 1m, 1h30m)
    Agg {
        #[arg(value_name = "INTERVAL")]
        time_between_reqs: String,
    },
    /// Register a feed and follow it
    Addfeed { name: String, url: String },
    /// List every registered feed
    Feeds,
    /// Follow an already registered feed
    Follow { url: String },
    /// List the feeds you follow
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from the feeds you follow
    Browse {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        limit: Option<i64>,
    },
}

/// Everything a command may read or change.
pub struct State {
    pub db: Database,
    pub config: Config,
    /// Where `config` is persisted when the logged-in user changes
    pub config_path: PathBuf,
}

impl Command {
    /// Runs the command. `cancel` stops `agg`; other commands ignore it.
    pub async fn execute(&self, state: &mut State, cancel: &CancellationToken) -> Result<(), Error> {
        match self {
            Command::Register { name } => register(state, name).await,
            Command::Login { name } => login(state, name).await,
            Command::Reset => reset(state).await,
            Command::Users => users(state).await,
            Command::Agg { time_between_reqs } => agg(state, time_between_reqs, cancel).await,
            Command::Addfeed { name, url } => add_feed(state, name, url).await,
            Command::Feeds => feeds(state).await,
            Command::Follow { url } => follow(state, url).await,
            Command::Following => following(state).await,
            Command::Unfollow { url } => unfollow(state, url).await,
            Command::Browse { limit } => {
                browse(state, limit.unwrap_or(DEFAULT_BROWSE_LIMIT)).await
            }
        }
    }
}

/// The logged-in user, which must still exist in the database.
pub async fn current_user(state: &State) -> Result<User, Error> {
    let name = state.config.current_user_name.as_deref().ok_or_else(|| {
        Error::Unauthenticated("no user is logged in, run `gator login <name>`".to_string())
    })?;

    state
        .db
        .get_user_by_name(name)
        .await?
        .ok_or_else(|| Error::Unauthenticated(format!("user {name:?} no longer exists")))
}

async fn register(state: &mut State, name: &str) -> Result<(), Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Configuration("user name must not be empty".to_string()));
    }

    let user = state.db.create_user(name).await.map_err(|e| match Error::from(e) {
        Error::DuplicatePost(_) => Error::DuplicatePost(format!("user {name:?}")),
        other => other,
    })?;
    state.config.set_user(&state.config_path, &user.name)?;

    tracing::info!(user_id = %user.id, name = %user.name, "User registered");
    println!("User created: {}", user.name);
    Ok(())
}

async fn login(state: &mut State, name: &str) -> Result<(), Error> {
    let user = state
        .db
        .get_user_by_name(name.trim())
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {name:?}")))?;
    state.config.set_user(&state.config_path, &user.name)?;

    println!("Logged in as {}", user.name);
    Ok(())
}

async fn reset(state: &mut State) -> Result<(), Error> {
    let removed = state.db.reset().await?;
    tracing::info!(users = removed, "Database reset");
    println!("Database reset: removed {removed} users");
    Ok(())
}

async fn users(state: &mut State) -> Result<(), Error> {
    let current = state.config.current_user_name.as_deref();
    for user in state.db.list_users().await? {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

async fn agg(state: &mut State, interval: &str, cancel: &CancellationToken) -> Result<(), Error> {
    let interval = parse_interval(interval)?;
    let fetcher = HttpFetcher::new(&state.config.user_agent, state.config.request_timeout())?;

    println!("Collecting feeds every {interval:?}");
    Aggregator::new(state.db.clone(), fetcher)
        .run(interval, cancel)
        .await
}

async fn add_feed(state: &mut State, name: &str, url: &str) -> Result<(), Error> {
    let user = current_user(state).await?;
    let url = validate_feed_url(url)?;

    let feed = state
        .db
        .create_feed(name.trim(), url.as_str(), user.id)
        .await
        .map_err(|e| match Error::from(e) {
            Error::DuplicatePost(_) => Error::DuplicatePost(format!("feed {url}")),
            other => other,
        })?;
    state.db.create_feed_follow(user.id, feed.id).await?;

    tracing::info!(feed_id = %feed.id, url = %feed.url, user = %user.name, "Feed added");
    println!("Feed added:");
    println!("  ID:   {}", feed.id);
    println!("  Name: {}", terminal_line(&feed.name, TITLE_WIDTH));
    println!("  URL:  {}", feed.url);
    println!("Following as {}", user.name);
    Ok(())
}

async fn feeds(state: &mut State) -> Result<(), Error> {
    for entry in state.db.list_feeds().await? {
        println!(
            "{} | {} | {}",
            terminal_line(&entry.feed.name, TITLE_WIDTH),
            entry.feed.url,
            entry.owner_name
        );
    }
    Ok(())
}

async fn follow(state: &mut State, url: &str) -> Result<(), Error> {
    let user = current_user(state).await?;
    let feed = lookup_feed(&state.db, url).await?;

    let follow = state
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .map_err(|e| match Error::from(e) {
            Error::DuplicatePost(_) => {
                Error::DuplicatePost(format!("follow of {} by {}", feed.url, user.name))
            }
            other => other,
        })?;

    println!(
        "{} | {}",
        terminal_line(&follow.feed_name, TITLE_WIDTH),
        follow.user_name
    );
    Ok(())
}

async fn following(state: &mut State) -> Result<(), Error> {
    let user = current_user(state).await?;
    for follow in state.db.feed_follows_for_user(user.id).await? {
        println!("* {}", terminal_line(&follow.feed_name, TITLE_WIDTH));
    }
    Ok(())
}

async fn unfollow(state: &mut State, url: &str) -> Result<(), Error> {
    let user = current_user(state).await?;
    let feed = lookup_feed(&state.db, url).await?;

    if !state.db.delete_feed_follow(user.id, feed.id).await? {
        return Err(Error::NotFound(format!(
            "{} does not follow {}",
            user.name, feed.url
        )));
    }

    println!("Unfollowed {}", terminal_line(&feed.name, TITLE_WIDTH));
    Ok(())
}

async fn browse(state: &mut State, limit: i64) -> Result<(), Error> {
    if limit < 1 {
        return Err(Error::Configuration(format!(
            "browse limit must be positive, got {limit}"
        )));
    }
    let user = current_user(state).await?;
    let posts = state.db.list_posts_for_user(user.id, limit).await?;

    println!("Found {} posts for {}:", posts.len(), user.name);
    for post in posts {
        let date = post
            .published_at
            .map(|t| t.format("%a %b %-d %Y").to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!("{date}");
        println!(
            "--- {} ---",
            terminal_line(post.title.as_deref().unwrap_or("(untitled)"), TITLE_WIDTH)
        );
        if let Some(description) = post.description.as_deref() {
            println!("    {}", terminal_line(description, DESCRIPTION_WIDTH));
        }
        println!("Link: {}", post.url);
        println!("=====================================");
    }
    Ok(())
}

/// Finds a registered feed by URL, accepting the spelling `addfeed` was given
/// as well as the normalized form it stored.
async fn lookup_feed(db: &Database, url: &str) -> Result<Feed, Error> {
    let raw = url.trim();
    if let Some(feed) = db.find_feed_by_url(raw).await? {
        return Ok(feed);
    }

    if let Ok(normalized) = Url::parse(raw) {
        if let Some(feed) = db.find_feed_by_url(normalized.as_str()).await? {
            return Ok(feed);
        }
    }

    Err(Error::NotFound(format!("no feed registered with URL {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn state(name: &str) -> State {
        let dir = std::env::temp_dir().join(format!("gator_commands_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        State {
            db: Database::open(":memory:").await.unwrap(),
            config: Config::default(),
            config_path: dir.join("config.toml"),
        }
    }

    async fn run(state: &mut State, command: Command) -> Result<(), Error> {
        command.execute(state, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_register_logs_in_and_persists() {
        let mut state = state("register").await;

        run(&mut state, Command::Register { name: "kahya".into() })
            .await
            .unwrap();

        assert_eq!(state.config.current_user_name.as_deref(), Some("kahya"));
        let saved = Config::load(&state.config_path).unwrap();
        assert_eq!(saved.current_user_name.as_deref(), Some("kahya"));

        let again = run(&mut state, Command::Register { name: "kahya".into() }).await;
        assert!(matches!(again, Err(Error::DuplicatePost(_))));
        assert_eq!(
            again.unwrap_err().to_string(),
            "Already exists: user \"kahya\""
        );
    }

    #[tokio::test]
    async fn test_login_requires_existing_user() {
        let mut state = state("login").await;

        let result = run(&mut state, Command::Login { name: "ghost".into() }).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(state.config.current_user_name, None);
    }

    #[tokio::test]
    async fn test_logged_in_commands_need_a_user() {
        let mut state = state("unauthenticated").await;

        for command in [
            Command::Following,
            Command::Browse { limit: None },
            Command::Follow {
                url: "https://blog.example.com/rss".into(),
            },
        ] {
            let result = run(&mut state, command).await;
            assert!(matches!(result, Err(Error::Unauthenticated(_))));
        }

        // A stale name in the config is no better
        state.config.current_user_name = Some("deleted".into());
        let result = run(&mut state, Command::Following).await;
        assert!(matches!(result, Err(Error::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_addfeed_follows_automatically() {
        let mut state = state("addfeed").await;
        run(&mut state, Command::Register { name: "lane".into() })
            .await
            .unwrap();

        run(
            &mut state,
            Command::Addfeed {
                name: "Hacker News".into(),
                url: "https://news.ycombinator.com/rss".into(),
            },
        )
        .await
        .unwrap();

        let user = current_user(&state).await.unwrap();
        let follows = state.db.feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_name, "Hacker News");
    }

    #[tokio::test]
    async fn test_addfeed_accepts_local_url_and_rejects_other_schemes() {
        let mut state = state("addfeed_local").await;
        run(&mut state, Command::Register { name: "lane".into() })
            .await
            .unwrap();

        let result = run(
            &mut state,
            Command::Addfeed {
                name: "Archive".into(),
                url: "ftp://example.com/rss".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(state.db.list_feeds().await.unwrap().is_empty());

        run(
            &mut state,
            Command::Addfeed {
                name: "Local".into(),
                url: "http://127.0.0.1:8080/rss".into(),
            },
        )
        .await
        .unwrap();
        let feeds = state.db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed.url, "http://127.0.0.1:8080/rss");
    }

    #[tokio::test]
    async fn test_follow_and_unfollow_by_url() {
        let mut state = state("follow").await;
        run(&mut state, Command::Register { name: "owner".into() })
            .await
            .unwrap();
        run(
            &mut state,
            Command::Addfeed {
                name: "Blog".into(),
                url: "https://blog.example.com".into(),
            },
        )
        .await
        .unwrap();
        run(&mut state, Command::Register { name: "reader".into() })
            .await
            .unwrap();

        // Stored normalized with a trailing slash, looked up either way
        run(
            &mut state,
            Command::Follow {
                url: "https://blog.example.com".into(),
            },
        )
        .await
        .unwrap();

        let duplicate = run(
            &mut state,
            Command::Follow {
                url: "https://blog.example.com/".into(),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(Error::DuplicatePost(_))));
        assert!(duplicate
            .unwrap_err()
            .to_string()
            .starts_with("Already exists: follow of https://blog.example.com/"));

        run(
            &mut state,
            Command::Unfollow {
                url: "https://blog.example.com/".into(),
            },
        )
        .await
        .unwrap();

        let again = run(
            &mut state,
            Command::Unfollow {
                url: "https://blog.example.com/".into(),
            },
        )
        .await;
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_follow_unknown_feed() {
        let mut state = state("follow_unknown").await;
        run(&mut state, Command::Register { name: "reader".into() })
            .await
            .unwrap();

        let result = run(
            &mut state,
            Command::Follow {
                url: "https://nowhere.example.com/rss".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_removes_everything() {
        let mut state = state("reset").await;
        run(&mut state, Command::Register { name: "lane".into() })
            .await
            .unwrap();
        run(
            &mut state,
            Command::Addfeed {
                name: "Blog".into(),
                url: "https://blog.example.com/rss".into(),
            },
        )
        .await
        .unwrap();

        run(&mut state, Command::Reset).await.unwrap();

        assert!(state.db.list_users().await.unwrap().is_empty());
        assert!(state.db.list_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_agg_rejects_bad_interval_before_work() {
        let mut state = state("agg_interval").await;

        for interval in ["soon", "0s", "-1m"] {
            let result = run(
                &mut state,
                Command::Agg {
                    time_between_reqs: interval.into(),
                },
            )
            .await;
            assert!(
                matches!(result, Err(Error::Configuration(_))),
                "{interval} accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_browse_rejects_non_positive_limit() {
        let mut state = state("browse_limit").await;
        run(&mut state, Command::Register { name: "lane".into() })
            .await
            .unwrap();

        let result = run(&mut state, Command::Browse { limit: Some(0) }).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
        run(&mut state, Command::Browse { limit: None }).await.unwrap();
    }
}
