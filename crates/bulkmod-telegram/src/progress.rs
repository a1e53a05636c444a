//! A single status message per bulk run, edited as the run advances.

use std::future::IntoFuture;

use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode};
use tokio::sync::Mutex;

use bulkmod_core::{
    errors::Error,
    formatting::{render_abort, render_operation_summary, render_started, render_targets},
    moderation::{OperationKind, OperationReport},
    ports::ProgressObserver,
    utils::best_effort,
};

pub struct StatusMessage {
    bot: Bot,
    chat: teloxide::types::ChatId,
    stealth: bool,
    message: Mutex<Option<teloxide::types::MessageId>>,
}

impl StatusMessage {
    pub fn new(bot: Bot, chat: teloxide::types::ChatId, stealth: bool) -> Self {
        Self {
            bot,
            chat,
            stealth,
            message: Mutex::new(None),
        }
    }

    /// Edit the status message, or send it if there is none yet.
    async fn show(&self, html: String) {
        let mut current = self.message.lock().await;
        if let Some(id) = *current {
            best_effort(
                "edit status message",
                self.bot
                    .edit_message_text(self.chat, id, html)
                    .parse_mode(ParseMode::Html)
                    .into_future(),
            )
            .await;
            return;
        }
        match self
            .bot
            .send_message(self.chat, html)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(msg) => *current = Some(msg.id),
            Err(e) => tracing::warn!(error = %e, "failed to send status message"),
        }
    }
}

#[async_trait]
impl ProgressObserver for StatusMessage {
    async fn on_started(&self, kind: OperationKind) {
        if !self.stealth {
            self.show(render_started(kind)).await;
        }
    }

    async fn on_targets(&self, kind: OperationKind, count: usize) {
        if !self.stealth {
            self.show(render_targets(kind, count)).await;
        }
    }

    async fn on_finished(&self, report: &OperationReport, departing: bool) {
        if !self.stealth {
            self.show(render_operation_summary(report, departing)).await;
        }
    }

    /// Aborts are always reported, even in stealth mode.
    async fn on_failed(&self, kind: OperationKind, error: &Error) {
        self.show(render_abort(kind, error)).await;
    }
}
