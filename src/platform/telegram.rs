use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::SetWebhookSetters;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{info, warn};

use crate::error::DeliveryError;
use crate::format::{format_price, format_with_commas};
use crate::platform::ChatReplier;
use crate::aggregate::TokenInfo;

pub const FETCH_FAILURE_NOTICE: &str =
    "🙅 There were problems fetching the latest $GRUMPY token info. Figures...";

/// Sends replies through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramReplier {
    bot: Bot,
}

impl TelegramReplier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatReplier for TelegramReplier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text.to_string())
            .await
            .map_err(|e| DeliveryError {
                chat_id,
                source: Box::new(e),
            })?;
        Ok(())
    }
}

/// Reply to a `/price` command.
pub fn price_reply(info: &TokenInfo) -> String {
    format!(
        "💵 Price: {}\n💎 Holders: {}\n",
        format_price(info.price_rate),
        format_with_commas(info.holders_count)
    )
}

/// Point Telegram at our webhook, uploading the self-signed certificate if present.
pub async fn register_webhook(bot: &Bot, url: &str, certificate: &Path) -> Result<()> {
    let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;

    let request = bot.set_webhook(url.clone());
    let request = if certificate.exists() {
        request.certificate(InputFile::file(certificate.to_path_buf()))
    } else {
        warn!(
            "Certificate {} not found, registering webhook without it",
            certificate.display()
        );
        request
    };

    request
        .await
        .with_context(|| format!("Failed to register webhook {}", url))?;

    info!("Webhook registered at {}", url);
    Ok(())
}
