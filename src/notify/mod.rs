// src/notify/mod.rs
//! Channel registry + router: fans one formatted alert out to every channel a
//! subscriber has configured, concurrently, and collects one outcome per task.

pub mod email;
pub mod pushdeer;
pub mod sms;
pub mod telegram;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::notify::NotifyConfig;
use crate::error::DeliveryError;
use crate::evaluate::Subscriber;
use crate::ingest::feed::DEFAULT_REQUEST_TIMEOUT;
use crate::metrics::{DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Mail,
    Push,
    Chat,
    Sms,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Mail,
        ChannelKind::Push,
        ChannelKind::Chat,
        ChannelKind::Sms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Mail => "mail",
            ChannelKind::Push => "push",
            ChannelKind::Chat => "chat",
            ChannelKind::Sms => "sms",
        }
    }

    /// Whether one send carries the whole address list. Push and chat are
    /// single-recipient protocols and get one task per address.
    pub fn batches_recipients(&self) -> bool {
        matches!(self, ChannelKind::Mail | ChannelKind::Sms)
    }

    /// Whether the adapter splits one batched task into several outbound
    /// calls, each under its own deadline.
    pub fn fans_out_internally(&self) -> bool {
        matches!(self, ChannelKind::Sms)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel kind → addresses (emails, push keys, chat ids, phone numbers).
pub type ChannelMap = BTreeMap<ChannelKind, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedAlert {
    pub subject: String,
    pub body: String,
}

impl FormattedAlert {
    /// Push services only carry a single text field.
    pub fn push_text(&self) -> String {
        format!("{}\n{}", self.subject, self.body)
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError>;
}

/// Map non-2xx responses to [`DeliveryError::Status`], keeping the body for logs.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<(), DeliveryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Which adapters were initialized at startup. An absent entry is the
/// normal "channel unavailable" case, e.g. missing credentials.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    adapters: HashMap<ChannelKind, Arc<dyn Notifier>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.insert(notifier);
        self
    }

    pub fn insert(&mut self, notifier: Arc<dyn Notifier>) {
        self.adapters.insert(notifier.kind(), notifier);
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn Notifier>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn is_configured(&self, kind: ChannelKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn configured_kinds(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|k| self.is_configured(*k))
            .collect()
    }

    /// Build adapters from the `[notify]` section. Incomplete sections are
    /// logged and left out.
    pub fn from_config(cfg: &NotifyConfig, client: Client, timeout: Duration) -> Self {
        let mut reg = Self::new();

        if let Some(smtp) = &cfg.smtp {
            match email::EmailNotifier::from_config(smtp, timeout) {
                Ok(n) => reg.insert(Arc::new(n)),
                Err(e) => warn!(target: "notify", error = %format!("{e:#}"), "mail channel disabled"),
            }
        }
        if let Some(pd) = &cfg.pushdeer {
            reg.insert(Arc::new(pushdeer::PushDeerNotifier::new(
                pd.server.clone(),
                client.clone(),
            )));
        }
        if let Some(tg) = &cfg.telegram {
            match telegram::TelegramNotifier::from_config(tg, client.clone()) {
                Ok(n) => reg.insert(Arc::new(n)),
                Err(e) => warn!(target: "notify", error = %format!("{e:#}"), "chat channel disabled"),
            }
        }
        if let Some(sms_cfg) = &cfg.sms {
            match sms::SmsGatewayNotifier::from_config(sms_cfg, client) {
                Ok(n) => reg.insert(Arc::new(n.with_timeout(timeout))),
                Err(e) => warn!(target: "notify", error = %format!("{e:#}"), "sms channel disabled"),
            }
        }

        reg
    }
}

/// Result of one dispatch task.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub channel: ChannelKind,
    pub recipients: Vec<String>,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct NotificationRouter {
    registry: ChannelRegistry,
    timeout: Duration,
}

impl NotificationRouter {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self {
            registry,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Send `alert` on every channel `subscriber` has addresses for.
    ///
    /// All tasks run concurrently and are awaited together; one failing task
    /// never cancels another. Channels without an initialized adapter are
    /// skipped with an error log and produce no outcome.
    pub async fn dispatch(&self, subscriber: &Subscriber, alert: &FormattedAlert) -> Vec<DeliveryOutcome> {
        let alert = Arc::new(alert.clone());
        let mut planned: Vec<(ChannelKind, Vec<String>)> = Vec::new();

        for (kind, addrs) in subscriber.active_channels() {
            if !self.registry.is_configured(kind) {
                error!(
                    target: "notify",
                    subscriber = %subscriber.name,
                    channel = kind.as_str(),
                    "channel adapter is not initialized, skipping"
                );
                counter!(DELIVERY_FAILURES_TOTAL, "channel" => kind.as_str()).increment(1);
                continue;
            }
            if kind.batches_recipients() {
                planned.push((kind, addrs.to_vec()));
            } else {
                planned.extend(addrs.iter().map(|a| (kind, vec![a.clone()])));
            }
        }

        let mut set = JoinSet::new();
        for (idx, (kind, recipients)) in planned.iter().enumerate() {
            let Some(notifier) = self.registry.get(*kind) else {
                continue;
            };
            let recipients = recipients.clone();
            let alert = Arc::clone(&alert);
            // Per-call deadlines live inside fan-out adapters; this one is only a backstop.
            let timeout = if kind.fans_out_internally() {
                self.timeout * 2
            } else {
                self.timeout
            };
            counter!(DELIVERIES_TOTAL, "channel" => kind.as_str()).increment(1);

            set.spawn(async move {
                let res = match tokio::time::timeout(timeout, notifier.send(&recipients, &alert)).await {
                    Ok(r) => r,
                    Err(_) => Err(DeliveryError::Timeout(timeout)),
                };
                (idx, res)
            });
        }

        let mut results: Vec<Option<Result<(), DeliveryError>>> = (0..planned.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, res)) => results[idx] = Some(res),
                Err(e) => error!(target: "notify", error = %e, "delivery task aborted"),
            }
        }

        let mut outcomes = Vec::with_capacity(planned.len());
        for ((channel, recipients), res) in planned.into_iter().zip(results) {
            let result = res.unwrap_or_else(|| Err(DeliveryError::TaskAborted(channel.to_string())));
            match &result {
                Ok(()) => info!(
                    target: "notify",
                    subscriber = %subscriber.name,
                    channel = channel.as_str(),
                    recipients = recipients.len(),
                    "alert delivered"
                ),
                Err(e) => {
                    warn!(
                        target: "notify",
                        subscriber = %subscriber.name,
                        channel = channel.as_str(),
                        recipients = recipients.len(),
                        error = %e,
                        "alert delivery failed"
                    );
                    counter!(DELIVERY_FAILURES_TOTAL, "channel" => channel.as_str()).increment(1);
                }
            }
            outcomes.push(DeliveryOutcome {
                channel,
                recipients,
                result,
            });
        }

        outcomes
    }
}
