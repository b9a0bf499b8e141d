use std::sync::Arc;

use confess_core::{
    config::Config,
    router::App,
    store::{DocumentStore, MemoryStore},
};
use confess_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), confess_core::Error> {
    confess_core::logging::init("confess")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn DocumentStore> = match &cfg.store_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening store snapshot");
            Arc::new(MemoryStore::open(path)?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let messenger = Arc::new(TelegramMessenger::from_token(&cfg.bot_token));

    tracing::info!(
        admins = cfg.admin_ids.len(),
        channel = %cfg.channel_id,
        bot = %cfg.bot_username,
        "confession bot starting"
    );

    let app = Arc::new(App::new(cfg, store, messenger));

    confess_telegram::webhook::serve(app)
        .await
        .map_err(|e| confess_core::Error::Transport(format!("webhook server failed: {e}")))?;

    Ok(())
}
