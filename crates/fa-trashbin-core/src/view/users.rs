use crate::config::AppConfig;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Unlimited,
    Bytes(u64),
}

impl Quota {
    /// Parse a quota setting: `none` means unlimited, otherwise a size such
    /// as `0 B`, `512 MB` or `2gb` in binary multiples.
    pub fn parse(value: &str) -> Option<Quota> {
        let value = value.trim().to_ascii_lowercase();
        if value == "none" || value == "default" {
            return Some(Quota::Unlimited);
        }
        let split = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(value.len());
        let (number, unit) = value.split_at(split);
        let number: f64 = number.parse().ok()?;
        let multiplier: f64 = match unit.trim() {
            "" | "b" => 1.0,
            "k" | "kb" => 1024.0,
            "m" | "mb" => 1024.0 * 1024.0,
            "g" | "gb" => 1024.0 * 1024.0 * 1024.0,
            "t" | "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
            _ => return None,
        };
        Some(Quota::Bytes((number * multiplier).round() as u64))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Quota::Bytes(0))
    }

    pub fn allows(&self, used: u64, additional: u64) -> bool {
        match self {
            Quota::Unlimited => true,
            Quota::Bytes(limit) => used.saturating_add(additional) <= *limit,
        }
    }
}

/// Account lookups the engine needs from the host.
pub trait UserDirectory {
    fn home(&self, uid: &str) -> PathBuf;
    fn quota(&self, uid: &str) -> Quota;
}

/// Homes and quotas taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConfiguredUsers {
    config: AppConfig,
}

impl ConfiguredUsers {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl UserDirectory for ConfiguredUsers {
    fn home(&self, uid: &str) -> PathBuf {
        self.config
            .users
            .get(uid)
            .and_then(|user| user.home.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.data_dir().join(uid))
    }

    fn quota(&self, uid: &str) -> Quota {
        let Some(setting) = self.config.users.get(uid).and_then(|u| u.quota.as_deref()) else {
            return Quota::Unlimited;
        };
        Quota::parse(setting).unwrap_or_else(|| {
            warn!("Ignoring unparsable quota '{}' for '{}'", setting, uid);
            Quota::Unlimited
        })
    }
}
