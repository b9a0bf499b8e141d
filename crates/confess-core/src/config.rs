use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, Result};

/// Typed configuration, resolved once at process start and passed around as
/// an immutable `Arc`. Permission checks read `is_admin`, never the
/// environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Telegram bot API token.
    pub bot_token: String,
    /// User ids allowed to moderate confessions.
    pub admin_ids: Vec<i64>,
    /// Publish target: `@channelname` or a numeric chat id.
    pub channel_id: String,
    /// Public bot username, used for deep links.
    pub bot_username: String,

    // Webhook endpoint
    pub webhook_addr: SocketAddr,
    pub webhook_path: String,

    // Workflow tuning
    pub confession_cooldown: Duration,
    pub comment_page_size: usize,

    /// Optional JSON snapshot path for the in-memory store.
    pub store_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));
        if admin_ids.is_empty() {
            return Err(Error::Config(
                "ADMIN_IDS environment variable is required".to_string(),
            ));
        }

        let channel_id = env_str("CHANNEL_ID").and_then(non_empty).ok_or_else(|| {
            Error::Config("CHANNEL_ID environment variable is required".to_string())
        })?;

        let bot_username = env_str("BOT_USERNAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string())
            .ok_or_else(|| {
                Error::Config("BOT_USERNAME environment variable is required".to_string())
            })?;

        let webhook_addr = env_str("WEBHOOK_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("WEBHOOK_ADDR is not a socket address: {e}")))?;
        let webhook_path = env_str("WEBHOOK_PATH").unwrap_or_else(|| "/api/bot".to_string());

        let confession_cooldown =
            Duration::from_millis(env_u64("CONFESSION_COOLDOWN_MS").unwrap_or(60_000));
        let comment_page_size = env_usize("COMMENT_PAGE_SIZE").unwrap_or(5).max(1);

        let store_path = env_str("STORE_PATH").and_then(non_empty).map(PathBuf::from);

        Ok(Self {
            bot_token,
            admin_ids,
            channel_id,
            bot_username,
            webhook_addr,
            webhook_path,
            confession_cooldown,
            comment_page_size,
            store_path,
        })
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_ids.contains(&user.0)
    }

    /// Public link to the bot itself.
    pub fn bot_link(&self) -> String {
        format!("https://t.me/{}", self.bot_username)
    }

    /// Deep link that lands a user on the comment view for a confession.
    pub fn comment_deep_link(&self, confession: &crate::domain::ConfessionId) -> String {
        format!(
            "https://t.me/{}?start=comment_{}",
            self.bot_username, confession
        )
    }

    /// Public link to the channel, when the channel has a username.
    pub fn channel_link(&self) -> Option<String> {
        self.channel_id
            .strip_prefix('@')
            .map(|name| format!("https://t.me/{name}"))
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
