// src/config/notify.rs
use serde::Deserialize;

/// `[notify]` section: one optional table per delivery channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub pushdeer: Option<PushDeerConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub sms: Option<SmsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Login name; also used as the From address.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushDeerConfig {
    pub server: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    pub server: Option<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub sign_name: Option<String>,
    pub template_code: Option<String>,
}
