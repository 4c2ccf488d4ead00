// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for records and `index.redb` | `/data` |
//! | `CHAINS_DOMAIN` | Base domain appended to every routing host | Required |
//! | `POKT_ENDPOINT` | External RPC network base URL | Required |
//! | `POKT_ACCOUNT_PASS` | Passphrase protecting custodial keys | Required |
//! | `SESSION_SECRET` | HS256 session signing secret (32+ chars) | Required |
//! | `SESSION_TTL_HOURS` | Session lifetime | `24` |
//! | `ADMIN_KEY` | Operator key for admin sessions | Unset (admin API disabled) |
//! | `ACCOUNT_DELETE_COOLDOWN_HOURS` | Email re-registration cooldown | `24` |
//! | `NODE_DELETE_COOLDOWN_HOURS` | Node address re-registration cooldown | `24` |
//! | `DOMAIN_DELETE_COOLDOWN_HOURS` | Domain re-binding cooldown | `24` |
//! | `CONSENSUS_REDUNDANCY` | Redundant attempts per network query | `3` |
//! | `CONSENSUS_TIMEOUT_MS` | Per-attempt timeout | `5000` |
//! | `VERIFY_NODE_STAKE` | Require staked status before node registration | `true` |
//! | `RECONCILE_INTERVAL_SECS` | Reconciler period, `0` disables | `300` |
//! | `RECAPTCHA_SECRET` | reCAPTCHA secret for invites and email changes | Unset (check skipped) |
//! | `INVITE_WEBHOOK_URL` | Receives issued invitations for delivery | Unset (stored only) |
//! | `INVITATION_TTL_HOURS` | Invitation lifetime | `24` |
//! | `REQUIRE_INVITATION` | Registration needs a live invitation | `false` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,community_chains_server=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::invite::InviteSettings;
use crate::routing::{Cooldowns, RoutingSettings};
use crate::storage::paths::DATA_ROOT;

/// Minimum `SESSION_SECRET` length.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Paths to a PEM certificate chain and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub chains_domain: String,
    pub pokt_endpoint: String,
    pub account_passphrase: String,
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub admin_key: Option<String>,
    pub cooldowns: Cooldowns,
    pub consensus_redundancy: usize,
    pub consensus_timeout: Duration,
    pub verify_node_stake: bool,
    /// `None` disables the reconciler.
    pub reconcile_interval: Option<Duration>,
    pub invites: InviteSettings,
    pub tls: Option<TlsPaths>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("chains_domain", &self.chains_domain)
            .field("pokt_endpoint", &self.pokt_endpoint)
            .field("admin_enabled", &self.admin_key.is_some())
            .field("cooldowns", &self.cooldowns)
            .field("consensus_redundancy", &self.consensus_redundancy)
            .field("consensus_timeout", &self.consensus_timeout)
            .field("verify_node_stake", &self.verify_node_stake)
            .field("reconcile_interval", &self.reconcile_interval)
            .field("recaptcha_enabled", &self.invites.recaptcha_secret.is_some())
            .field("invite_webhook", &self.invites.webhook)
            .field("require_invitation", &self.invites.require_invitation)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let host = env.optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = env.parsed("PORT", 8080)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                reason: e.to_string(),
            })?;

        let session_secret = env.required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} characters"),
            });
        }

        let chains_domain = env.required("CHAINS_DOMAIN")?.trim_matches('.').to_lowercase();
        let pokt_endpoint = env.required("POKT_ENDPOINT")?;
        url::Url::parse(&pokt_endpoint).map_err(|e| ConfigError::Invalid {
            name: "POKT_ENDPOINT",
            reason: e.to_string(),
        })?;

        let redundancy: usize = env.parsed("CONSENSUS_REDUNDANCY", 3)?;
        if redundancy == 0 {
            return Err(ConfigError::Invalid {
                name: "CONSENSUS_REDUNDANCY",
                reason: "must be at least 1".to_string(),
            });
        }

        let tls = match (env.optional("TLS_CERT_PATH"), env.optional("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("TLS_KEY_PATH")),
            (None, Some(_)) => return Err(ConfigError::Missing("TLS_CERT_PATH")),
        };

        let reconcile_secs: u64 = env.parsed("RECONCILE_INTERVAL_SECS", 300)?;

        let webhook = env
            .optional("INVITE_WEBHOOK_URL")
            .map(|raw| {
                url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    name: "INVITE_WEBHOOK_URL",
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        let invites = InviteSettings {
            recaptcha_secret: env.optional("RECAPTCHA_SECRET"),
            webhook,
            ttl: chrono::Duration::hours(env.parsed("INVITATION_TTL_HOURS", 24)?),
            require_invitation: env.parsed("REQUIRE_INVITATION", false)?,
        };

        Ok(Self {
            bind_addr,
            data_dir: env
                .optional("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATA_ROOT)),
            chains_domain,
            pokt_endpoint,
            account_passphrase: env.required("POKT_ACCOUNT_PASS")?,
            session_secret,
            session_ttl: chrono::Duration::hours(env.parsed("SESSION_TTL_HOURS", 24)?),
            admin_key: env.optional("ADMIN_KEY"),
            cooldowns: Cooldowns {
                account_hours: env.parsed("ACCOUNT_DELETE_COOLDOWN_HOURS", 24)?,
                node_hours: env.parsed("NODE_DELETE_COOLDOWN_HOURS", 24)?,
                domain_hours: env.parsed("DOMAIN_DELETE_COOLDOWN_HOURS", 24)?,
            },
            consensus_redundancy: redundancy,
            consensus_timeout: Duration::from_millis(env.parsed("CONSENSUS_TIMEOUT_MS", 5000)?),
            verify_node_stake: env.parsed("VERIFY_NODE_STAKE", true)?,
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            invites,
            tls,
        })
    }

    pub fn routing_settings(&self) -> RoutingSettings {
        RoutingSettings {
            cooldowns: self.cooldowns,
            verify_node_stake: self.verify_node_stake,
            ..RoutingSettings::new(self.chains_domain.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, String> {
        HashMap::from([
            ("CHAINS_DOMAIN", "Example.NET".to_string()),
            ("POKT_ENDPOINT", "https://rpc.example.net".to_string()),
            ("POKT_ACCOUNT_PASS", "operator-pass".to_string()),
            ("SESSION_SECRET", "s".repeat(32)),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.chains_domain, "example.net");
        assert_eq!(config.cooldowns, Cooldowns::default());
        assert_eq!(config.consensus_redundancy, 3);
        assert_eq!(config.consensus_timeout, Duration::from_millis(5000));
        assert!(config.verify_node_stake);
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(300)));
        assert!(config.admin_key.is_none());
        assert!(config.tls.is_none());
        assert!(config.invites.recaptcha_secret.is_none());
        assert!(config.invites.webhook.is_none());
        assert_eq!(config.invites.ttl, chrono::Duration::hours(24));
        assert!(!config.invites.require_invitation);
    }

    #[test]
    fn invite_settings_parse() {
        let mut vars = base();
        vars.insert("RECAPTCHA_SECRET", "captcha-secret".into());
        vars.insert("INVITE_WEBHOOK_URL", "https://mail.example.net/invite".into());
        vars.insert("INVITATION_TTL_HOURS", "48".into());
        vars.insert("REQUIRE_INVITATION", "true".into());

        let config = load(&vars).unwrap();
        assert_eq!(config.invites.recaptcha_secret.as_deref(), Some("captcha-secret"));
        assert_eq!(
            config.invites.webhook.as_ref().map(|u| u.as_str()),
            Some("https://mail.example.net/invite")
        );
        assert_eq!(config.invites.ttl, chrono::Duration::hours(48));
        assert!(config.invites.require_invitation);
        assert!(!format!("{config:?}").contains("captcha-secret"));

        vars.insert("INVITE_WEBHOOK_URL", "not a url".into());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "INVITE_WEBHOOK_URL", .. })
        ));
    }

    #[test]
    fn missing_required_is_named() {
        let mut vars = base();
        vars.remove("POKT_ACCOUNT_PASS");
        let err = load(&vars).unwrap_err();
        assert_eq!(err.to_string(), "POKT_ACCOUNT_PASS must be set");
    }

    #[test]
    fn short_session_secret_rejected() {
        let mut vars = base();
        vars.insert("SESSION_SECRET", "short".into());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "SESSION_SECRET", .. })
        ));
    }

    #[test]
    fn overrides_parse() {
        let mut vars = base();
        vars.insert("PORT", "9000".into());
        vars.insert("NODE_DELETE_COOLDOWN_HOURS", "48".into());
        vars.insert("VERIFY_NODE_STAKE", "false".into());
        vars.insert("RECONCILE_INTERVAL_SECS", "0".into());
        vars.insert("ADMIN_KEY", "op".into());

        let config = load(&vars).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.cooldowns.node_hours, 48);
        assert!(!config.verify_node_stake);
        assert_eq!(config.reconcile_interval, None);
        assert_eq!(config.admin_key.as_deref(), Some("op"));

        let settings = config.routing_settings();
        assert_eq!(settings.base_domain, "example.net");
        assert_eq!(settings.cooldowns.node_hours, 48);
    }

    #[test]
    fn half_tls_config_rejected() {
        let mut vars = base();
        vars.insert("TLS_CERT_PATH", "/certs/cert.pem".into());
        assert!(matches!(load(&vars), Err(ConfigError::Missing("TLS_KEY_PATH"))));
    }

    #[test]
    fn debug_hides_secrets() {
        let rendered = format!("{:?}", load(&base()).unwrap());
        assert!(!rendered.contains("operator-pass"));
        assert!(!rendered.contains(&"s".repeat(32)));
    }
}
