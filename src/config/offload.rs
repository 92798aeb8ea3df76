//! Hardware collective offload environment.
//!
//! The offload library is configured through its own environment variables. When
//! offload is enabled, [`OffloadConfig::env_defaults`] lists the assignments the
//! embedding launcher should export before the library loads. Variables the user
//! already set are never overridden.

use tracing::debug;

use crate::config::options::parse_bool;
use crate::error::Result;

pub const ENV_ENABLE_HCOLL: &str = "COMMKIT_ENABLE_HCOLL";
pub const ENV_HCOLL_BCOL: &str = "COMMKIT_HCOLL_BCOL";

pub const HCOLL_ENABLE_MCAST_ALL: &str = "HCOLL_ENABLE_MCAST_ALL";
pub const HCOLL_BCOL: &str = "HCOLL_BCOL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffloadConfig {
    pub enable_hcoll: bool,
    /// Basic collective component list handed to the offload library.
    pub bcol: Option<String>,
}

impl OffloadConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let enable_hcoll = match lookup(ENV_ENABLE_HCOLL) {
            Some(v) => parse_bool(ENV_ENABLE_HCOLL, &v)?,
            None => false,
        };
        let bcol = lookup(ENV_HCOLL_BCOL).filter(|v| !v.is_empty());
        Ok(Self { enable_hcoll, bcol })
    }

    /// Assignments to export for the offload library, skipping every variable for
    /// which `current` already has a value. Empty when offload is disabled.
    pub fn env_defaults(&self, current: impl Fn(&str) -> Option<String>) -> Vec<(String, String)> {
        if !self.enable_hcoll {
            return Vec::new();
        }
        let mut wanted = vec![(HCOLL_ENABLE_MCAST_ALL, "0".to_string())];
        if let Some(bcol) = &self.bcol {
            wanted.push((HCOLL_BCOL, bcol.clone()));
        }

        let out: Vec<(String, String)> = wanted
            .into_iter()
            .filter(|(var, _)| current(*var).is_none())
            .map(|(var, value)| (var.to_string(), value))
            .collect();
        for (var, value) in &out {
            debug!(%var, %value, "offload environment default");
        }
        out
    }
}
