use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::{check_status, ChannelKind, FormattedAlert, Notifier};
use crate::config::notify::TelegramConfig;
use crate::error::DeliveryError;

/// Chat channel through a Telegram relay bot: bearer-authenticated JSON POST.
pub struct TelegramNotifier {
    server: String,
    secret: String,
    client: Client,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    msg: &'a str,
    chatid: &'a str,
}

impl TelegramNotifier {
    pub fn from_config(cfg: &TelegramConfig, client: Client) -> Result<Self> {
        let server = cfg
            .server
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("telegram relay server missing")?;
        let secret = cfg
            .secret
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("telegram relay secret missing")?;

        Ok(Self {
            server,
            secret,
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError> {
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut first_err = None;
        for chat in recipients {
            let payload = RelayPayload {
                msg: &alert.body,
                chatid: chat,
            };
            let res = self
                .client
                .post(&self.server)
                .bearer_auth(&self.secret)
                .json(&payload)
                .send()
                .await;
            let res = match res {
                Ok(rsp) => check_status(rsp).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = res {
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
