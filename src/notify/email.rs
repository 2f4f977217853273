use std::time::Duration;

use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{ChannelKind, FormattedAlert, Notifier};
use crate::config::notify::SmtpConfig;
use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TlsMode {
    Implicit,
    StartTls,
    Plain,
}

/// 587 → STARTTLS; 465 or an explicit `tls = true` → implicit TLS.
pub(crate) fn tls_mode(port: Option<u16>, tls: bool) -> TlsMode {
    match port {
        Some(587) => TlsMode::StartTls,
        Some(465) => TlsMode::Implicit,
        _ if tls => TlsMode::Implicit,
        _ => TlsMode::Plain,
    }
}

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn from_config(cfg: &SmtpConfig, timeout: Duration) -> Result<Self> {
        let host = cfg
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .context("smtp host missing")?;
        let user = cfg
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("smtp username missing")?;

        let mut builder = match tls_mode(cfg.port, cfg.tls) {
            TlsMode::Implicit => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(host).context("invalid smtp host")?
            }
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .context("invalid smtp host")?,
            TlsMode::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        if let Some(port) = cfg.port {
            builder = builder.port(port);
        }
        if let Some(pass) = &cfg.password {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.clone()));
        }
        let mailer = builder.timeout(Some(timeout)).build();

        // The login doubles as the sender address.
        let from: Mailbox = user.parse().context("smtp username is not a mail address")?;

        Ok(Self { mailer, from })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Mail
    }

    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError> {
        let mut to = Vec::new();
        for addr in recipients.iter().filter(|a| a.contains('@')) {
            let mb: Mailbox = addr
                .parse()
                .map_err(|_| DeliveryError::Address(addr.clone()))?;
            to.push(mb);
        }
        if to.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(alert.subject.clone())
            .header(header::ContentType::TEXT_PLAIN);
        for mb in to {
            builder = builder.to(mb);
        }
        let msg = builder.body(alert.body.clone())?;

        self.mailer.send(msg).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_decides_tls_mode() {
        assert_eq!(tls_mode(Some(587), true), TlsMode::StartTls);
        assert_eq!(tls_mode(Some(465), false), TlsMode::Implicit);
        assert_eq!(tls_mode(Some(2525), true), TlsMode::Implicit);
        assert_eq!(tls_mode(Some(25), false), TlsMode::Plain);
        assert_eq!(tls_mode(None, false), TlsMode::Plain);
    }

    #[test]
    fn missing_host_disables_channel() {
        let cfg = SmtpConfig {
            host: None,
            port: Some(465),
            username: Some("alerts@example.com".into()),
            password: Some("x".into()),
            tls: true,
        };
        assert!(EmailNotifier::from_config(&cfg, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn recipients_without_at_sign_are_dropped() {
        let cfg = SmtpConfig {
            host: Some("localhost".into()),
            port: Some(2525),
            username: Some("alerts@example.com".into()),
            password: None,
            tls: false,
        };
        let n = EmailNotifier::from_config(&cfg, Duration::from_secs(1)).unwrap();
        let alert = FormattedAlert {
            subject: "s".into(),
            body: "b".into(),
        };
        let err = n.send(&["13800000000".to_string()], &alert).await.unwrap_err();
        assert!(matches!(err, DeliveryError::NoRecipients));
    }
}
