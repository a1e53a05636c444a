use std::{collections::HashMap, sync::Arc, time::Instant};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use bulkmod_core::{
    cache::MembershipCache,
    chat::ChatbotService,
    config::Config,
    domain::{ChatId, UserId},
    moderation::{Moderator, RetryPolicy},
    ports::AuthorizationSource,
    report::FileReportSink,
    security::ProtectionRoster,
};
use bulkmod_openrouter::OpenRouterClient;

use crate::directory::MemberDirectory;
use crate::handlers;
use crate::TelegramPlatform;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub moderator: Arc<Moderator>,
    pub roster: Arc<ProtectionRoster>,
    pub reports: Arc<FileReportSink>,
    pub directory: Arc<MemberDirectory>,
    pub chatbot: Option<Arc<ChatbotService>>,
    pub operations: Arc<RunningOperations>,
    pub bot_username: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn is_operator(&self, user: UserId) -> bool {
        self.roster.is_privileged_operator(user)
    }
}

/// At most one bulk run per chat; each run can be cancelled from the chat.
#[derive(Default)]
pub struct RunningOperations {
    inner: Mutex<HashMap<ChatId, CancellationToken>>,
}

impl RunningOperations {
    /// Token for a new run in `chat`, or `None` if one is already running.
    pub async fn begin(&self, chat: ChatId) -> Option<CancellationToken> {
        let mut map = self.inner.lock().await;
        if map.contains_key(&chat) {
            return None;
        }
        let token = CancellationToken::new();
        map.insert(chat, token.clone());
        Some(token)
    }

    pub async fn finish(&self, chat: ChatId) {
        self.inner.lock().await.remove(&chat);
    }

    /// Returns whether a run was found.
    pub async fn cancel(&self, chat: ChatId) -> bool {
        match self.inner.lock().await.get(&chat) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "bulkmod started");
            me.user.username.clone()
        }
        Err(e) => {
            tracing::warn!(error = %e, "get_me failed at startup");
            None
        }
    };

    let settings = cfg.operation_settings();
    let roster = Arc::new(ProtectionRoster::from_config(&cfg));
    tracing::info!(
        operators = roster.operator_count(),
        protected = cfg.protected_users.len(),
        concurrency = settings.max_concurrent_operations,
        stealth = settings.stealth_mode,
        "configuration loaded"
    );

    let reports = Arc::new(FileReportSink::new(cfg.log_dir.clone())?);
    let directory = Arc::new(MemberDirectory::new());
    let platform = Arc::new(TelegramPlatform::new(
        bot.clone(),
        directory.clone(),
        RetryPolicy::new(settings.flood_wait_threshold),
    ));
    let cache = Arc::new(
        MembershipCache::new(platform.clone(), settings.cache).with_reports(reports.clone()),
    );
    let moderator = Arc::new(Moderator::new(
        platform,
        cache,
        roster.clone(),
        reports.clone(),
        settings,
    ));

    let chatbot = match (cfg.chatbot_enabled, cfg.openrouter_api_key.as_deref()) {
        (true, Some(key)) => {
            let client = OpenRouterClient::new(key, cfg.chatbot_model.clone())?;
            tracing::info!(model = %client.model(), "chatbot enabled");
            Some(Arc::new(ChatbotService::new(
                Arc::new(client),
                roster.clone(),
                true,
            )))
        }
        _ => None,
    };

    let state = Arc::new(AppState {
        cfg,
        moderator,
        roster,
        reports,
        directory,
        chatbot,
        operations: Arc::new(RunningOperations::default()),
        bot_username,
        started_at: Instant::now(),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
