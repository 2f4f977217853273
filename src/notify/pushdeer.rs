use reqwest::Client;

use super::{check_status, ChannelKind, FormattedAlert, Notifier};
use crate::error::DeliveryError;

pub const DEFAULT_PUSHDEER_SERVER: &str = "https://api2.pushdeer.com";

/// PushDeer: one GET per push key, text in the query string.
pub struct PushDeerNotifier {
    server: String,
    client: Client,
}

impl PushDeerNotifier {
    pub fn new(server: Option<String>, client: Client) -> Self {
        let server = server
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUSHDEER_SERVER.to_string());
        Self { server, client }
    }

    fn endpoint(&self) -> String {
        format!("{}/message/push", self.server.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Notifier for PushDeerNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError> {
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }
        let text = alert.push_text();
        let mut first_err = None;

        for key in recipients {
            let res = self
                .client
                .get(self.endpoint())
                .query(&[("pushkey", key.as_str()), ("text", text.as_str())])
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
