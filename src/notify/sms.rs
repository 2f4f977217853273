use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tokio::task::JoinSet;

use super::{check_status, ChannelKind, FormattedAlert, Notifier};
use crate::config::notify::SmsConfig;
use crate::error::DeliveryError;
use crate::ingest::feed::DEFAULT_REQUEST_TIMEOUT;

/// Template-based SMS through an HTTP gateway. The whole number list arrives
/// in one call; the gateway is hit once per number, concurrently, each post
/// under its own deadline.
pub struct SmsGatewayNotifier {
    endpoint: String,
    token: Option<String>,
    sign_name: String,
    template_code: String,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct TemplateParam<'a> {
    node: &'a str,
}

#[derive(Serialize)]
struct SmsRequest<'a> {
    phone_numbers: &'a str,
    sign_name: &'a str,
    template_code: &'a str,
    template_param: TemplateParam<'a>,
}

impl SmsGatewayNotifier {
    pub fn from_config(cfg: &SmsConfig, client: Client) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("sms gateway endpoint missing")?;
        let template_code = cfg
            .template_code
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("sms template code missing")?;

        Ok(Self {
            endpoint,
            token: cfg.token.clone().filter(|t| !t.trim().is_empty()),
            sign_name: cfg.sign_name.clone().unwrap_or_default(),
            template_code,
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Deadline for each single post.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, number: &str, subject: &str) -> RequestBuilder {
        let req = SmsRequest {
            phone_numbers: number,
            sign_name: &self.sign_name,
            template_code: &self.template_code,
            template_param: TemplateParam { node: subject },
        };
        let call = self.client.post(&self.endpoint).json(&req);
        match &self.token {
            Some(token) => call.bearer_auth(token),
            None => call,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SmsGatewayNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError> {
        let numbers: Vec<&String> = recipients.iter().filter(|n| !n.contains('@')).collect();
        if numbers.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut set = JoinSet::new();
        for number in numbers {
            let call = self.request(number, &alert.subject);
            let number = number.clone();
            let timeout = self.timeout;
            set.spawn(async move {
                let post = async {
                    let rsp = call.send().await?;
                    check_status(rsp).await
                };
                let res = match tokio::time::timeout(timeout, post).await {
                    Ok(r) => r,
                    Err(_) => Err(DeliveryError::Timeout(timeout)),
                };
                (number, res)
            });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((number, Err(e))) => {
                    tracing::warn!(target: "notify", number = %number, error = %e, "sms send failed");
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(target: "notify", error = %e, "sms task aborted");
                    first_err.get_or_insert(DeliveryError::TaskAborted(ChannelKind::Sms.to_string()));
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
