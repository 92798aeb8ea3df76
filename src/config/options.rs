//! Static collective configuration.
//!
//! [`CollOptions`] is read once at init, either from `COMMKIT_*` environment variables
//! or deserialized from any serde source. Every field has a default, so a partial
//! document is valid.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::coll::CollKind;
use crate::error::{CommError, Result};

pub const ENV_DEVICE_COLLECTIVES: &str = "COMMKIT_DEVICE_COLLECTIVES";
pub const ENV_IGATHER_DEVICE_COLLECTIVE: &str = "COMMKIT_IGATHER_DEVICE_COLLECTIVE";
pub const ENV_IGATHER_INTRA_ALGORITHM: &str = "COMMKIT_IGATHER_INTRA_ALGORITHM";
pub const ENV_IGATHER_INTER_ALGORITHM: &str = "COMMKIT_IGATHER_INTER_ALGORITHM";
pub const ENV_IGATHER_TREE_KVAL: &str = "COMMKIT_IGATHER_TREE_KVAL";
pub const ENV_GATHER_INTER_SHORT_MSG_SIZE: &str = "COMMKIT_GATHER_INTER_SHORT_MSG_SIZE";
pub const ENV_COLL_SELECTION_TUNING_JSON_FILE: &str = "COMMKIT_COLL_SELECTION_TUNING_JSON_FILE";

/// Whether the device layer may override collective algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCollectives {
    All,
    #[default]
    None,
    /// Decided per collective by its own flag.
    Percoll,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgatherIntraAlgorithm {
    #[default]
    Auto,
    SchedAuto,
    SchedBinomial,
    GentranTree,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgatherInterAlgorithm {
    #[default]
    Auto,
    SchedAuto,
    SchedLong,
    SchedShort,
}

fn default_true() -> bool {
    true
}

fn default_tree_kval() -> usize {
    2
}

fn default_short_msg_size() -> usize {
    2048
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollOptions {
    #[serde(default)]
    pub device_collectives: DeviceCollectives,
    /// Only consulted under [`DeviceCollectives::Percoll`].
    #[serde(default = "default_true")]
    pub igather_device_collective: bool,
    #[serde(default)]
    pub igather_intra_algorithm: IgatherIntraAlgorithm,
    #[serde(default)]
    pub igather_inter_algorithm: IgatherInterAlgorithm,
    /// Fan-out of the tree igather.
    #[serde(default = "default_tree_kval")]
    pub igather_tree_kval: usize,
    /// Inter gathers below this many bytes use the short algorithm.
    #[serde(default = "default_short_msg_size")]
    pub gather_inter_short_msg_size: usize,
    #[serde(default)]
    pub coll_selection_tuning_json_file: Option<PathBuf>,
}

impl Default for CollOptions {
    fn default() -> Self {
        Self {
            device_collectives: DeviceCollectives::default(),
            igather_device_collective: default_true(),
            igather_intra_algorithm: IgatherIntraAlgorithm::default(),
            igather_inter_algorithm: IgatherInterAlgorithm::default(),
            igather_tree_kval: default_tree_kval(),
            gather_inter_short_msg_size: default_short_msg_size(),
            coll_selection_tuning_json_file: None,
        }
    }
}

impl CollOptions {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds options from an arbitrary variable source; unset variables keep their
    /// defaults, malformed ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut opts = Self::default();
        if let Some(v) = lookup(ENV_DEVICE_COLLECTIVES) {
            opts.device_collectives = parse_enum(ENV_DEVICE_COLLECTIVES, &v)?;
        }
        if let Some(v) = lookup(ENV_IGATHER_DEVICE_COLLECTIVE) {
            opts.igather_device_collective = parse_bool(ENV_IGATHER_DEVICE_COLLECTIVE, &v)?;
        }
        if let Some(v) = lookup(ENV_IGATHER_INTRA_ALGORITHM) {
            opts.igather_intra_algorithm = parse_enum(ENV_IGATHER_INTRA_ALGORITHM, &v)?;
        }
        if let Some(v) = lookup(ENV_IGATHER_INTER_ALGORITHM) {
            opts.igather_inter_algorithm = parse_enum(ENV_IGATHER_INTER_ALGORITHM, &v)?;
        }
        if let Some(v) = lookup(ENV_IGATHER_TREE_KVAL) {
            opts.igather_tree_kval = parse_usize(ENV_IGATHER_TREE_KVAL, &v)?;
        }
        if let Some(v) = lookup(ENV_GATHER_INTER_SHORT_MSG_SIZE) {
            opts.gather_inter_short_msg_size = parse_usize(ENV_GATHER_INTER_SHORT_MSG_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_COLL_SELECTION_TUNING_JSON_FILE) {
            if !v.is_empty() {
                opts.coll_selection_tuning_json_file = Some(PathBuf::from(v));
            }
        }
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.igather_tree_kval == 0 {
            return Err(CommError::Config("igather tree fan-out must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether the device layer takes over collective `coll`.
    pub fn device_override(&self, coll: CollKind) -> bool {
        match self.device_collectives {
            DeviceCollectives::All => true,
            DeviceCollectives::None => false,
            DeviceCollectives::Percoll => match coll {
                CollKind::Igather => self.igather_device_collective,
            },
        }
    }
}

fn invalid(var: &str, value: &str) -> CommError {
    CommError::InvalidEnv { var: var.to_string(), value: value.to_string() }
}

fn parse_enum<T: DeserializeOwned>(var: &str, value: &str) -> Result<T> {
    let key = serde_json::Value::String(value.trim().to_ascii_lowercase());
    serde_json::from_value(key).map_err(|_| invalid(var, value))
}

pub(crate) fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value)),
    }
}

fn parse_usize(var: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| invalid(var, value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let opts = CollOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(opts, CollOptions::default());
        assert_eq!(opts.igather_tree_kval, 2);
        assert_eq!(opts.gather_inter_short_msg_size, 2048);
        assert!(!opts.device_override(CollKind::Igather));
    }

    #[test]
    fn variables_override_defaults() {
        let opts = CollOptions::from_lookup(lookup(&[
            (ENV_DEVICE_COLLECTIVES, "percoll"),
            (ENV_IGATHER_DEVICE_COLLECTIVE, "0"),
            (ENV_IGATHER_INTRA_ALGORITHM, "Gentran_Tree"),
            (ENV_IGATHER_INTER_ALGORITHM, "sched_short"),
            (ENV_IGATHER_TREE_KVAL, "4"),
            (ENV_GATHER_INTER_SHORT_MSG_SIZE, " 100 "),
            (ENV_COLL_SELECTION_TUNING_JSON_FILE, "/etc/commkit/tuning.json"),
        ]))
        .unwrap();
        assert_eq!(opts.device_collectives, DeviceCollectives::Percoll);
        assert!(!opts.device_override(CollKind::Igather));
        assert_eq!(opts.igather_intra_algorithm, IgatherIntraAlgorithm::GentranTree);
        assert_eq!(opts.igather_inter_algorithm, IgatherInterAlgorithm::SchedShort);
        assert_eq!(opts.igather_tree_kval, 4);
        assert_eq!(opts.gather_inter_short_msg_size, 100);
        assert_eq!(
            opts.coll_selection_tuning_json_file.as_deref(),
            Some(std::path::Path::new("/etc/commkit/tuning.json"))
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = CollOptions::from_lookup(lookup(&[(ENV_IGATHER_INTER_ALGORITHM, "ring")])).unwrap_err();
        assert!(matches!(err, CommError::InvalidEnv { ref var, .. } if var == ENV_IGATHER_INTER_ALGORITHM));
        assert!(CollOptions::from_lookup(lookup(&[(ENV_IGATHER_TREE_KVAL, "-1")])).is_err());
        assert!(CollOptions::from_lookup(lookup(&[(ENV_IGATHER_DEVICE_COLLECTIVE, "maybe")])).is_err());
    }

    #[test]
    fn zero_fanout_is_a_config_error() {
        let err = CollOptions::from_lookup(lookup(&[(ENV_IGATHER_TREE_KVAL, "0")])).unwrap_err();
        assert!(matches!(err, CommError::Config(_)));
    }

    #[test]
    fn partial_json_document_keeps_defaults() {
        let opts: CollOptions = serde_json::from_str(r#"{ "device_collectives": "all" }"#).unwrap();
        assert!(opts.device_override(CollKind::Igather));
        assert!(opts.igather_device_collective);
        assert_eq!(opts.igather_tree_kval, 2);
    }
}
