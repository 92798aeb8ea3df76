//! Cost-model algorithm selection.
//!
//! A [`CollSelector`] maps a [`CollSignature`] to a concrete [`Algorithm`]. The default
//! [`TableSelector`] walks an ordered list of [`SelectionRule`]s and returns the
//! algorithm of the first rule whose constraints all hold. Rules can be loaded from a
//! JSON tuning file:
//!
//! ```json
//! { "rules": [
//!     { "coll": "igather", "comm_kind": "intra", "max_msg_size": 512,
//!       "algorithm": { "name": "igather_intra_gentran_tree", "k": 4 } },
//!     { "coll": "igather", "comm_kind": "intra",
//!       "algorithm": { "name": "igather_intra_sched_binomial" } }
//! ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::coll::{CollKind, CollSignature};
use crate::comm::CommKind;
use crate::error::Result;

/// Algorithm ids known to the dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Algorithm {
    /// Transport-native tree gather with fan-out `k`.
    IgatherIntraGentranTree { k: usize },
    IgatherIntraSchedAuto,
    IgatherIntraSchedBinomial,
    IgatherInterSchedAuto,
    IgatherInterSchedLong,
    IgatherInterSchedShort,
}

impl Algorithm {
    /// Communicator kind the algorithm runs on.
    pub fn comm_kind(&self) -> CommKind {
        match self {
            Algorithm::IgatherIntraGentranTree { .. }
            | Algorithm::IgatherIntraSchedAuto
            | Algorithm::IgatherIntraSchedBinomial => CommKind::Intra,
            Algorithm::IgatherInterSchedAuto
            | Algorithm::IgatherInterSchedLong
            | Algorithm::IgatherInterSchedShort => CommKind::Inter,
        }
    }

    pub fn coll(&self) -> CollKind {
        CollKind::Igather
    }
}

/// Cost model: signature in, algorithm out.
///
/// `None` means no rule covers the call, which the dispatcher treats as fatal.
pub trait CollSelector: Send + Sync {
    fn search(&self, sig: &CollSignature<'_>) -> Option<Algorithm>;
}

/// One entry of a selection table. Absent constraints match anything; size bounds are
/// inclusive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionRule {
    #[serde(default)]
    pub coll: Option<CollKind>,
    #[serde(default)]
    pub comm_kind: Option<CommKind>,
    #[serde(default)]
    pub max_comm_size: Option<usize>,
    #[serde(default)]
    pub max_msg_size: Option<usize>,
    pub algorithm: Algorithm,
}

impl SelectionRule {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { coll: None, comm_kind: None, max_comm_size: None, max_msg_size: None, algorithm }
    }

    pub fn matches(&self, sig: &CollSignature<'_>) -> bool {
        self.coll.is_none_or(|c| c == sig.coll())
            && self.comm_kind.is_none_or(|k| k == sig.comm.kind())
            && self.max_comm_size.is_none_or(|n| sig.comm.local_size() <= n)
            && self.max_msg_size.is_none_or(|n| sig.msg_size() <= n)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct TuningFile {
    rules: Vec<SelectionRule>,
}

/// Ordered rule table; first match wins.
#[derive(Clone, Debug)]
pub struct TableSelector {
    rules: Vec<SelectionRule>,
}

impl Default for TableSelector {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}

impl TableSelector {
    pub fn new(rules: Vec<SelectionRule>) -> Self {
        Self { rules }
    }

    /// Fallback table: the composite auto algorithm for each communicator kind.
    pub fn default_rules() -> Vec<SelectionRule> {
        vec![
            SelectionRule {
                coll: Some(CollKind::Igather),
                comm_kind: Some(CommKind::Intra),
                ..SelectionRule::new(Algorithm::IgatherIntraSchedAuto)
            },
            SelectionRule {
                coll: Some(CollKind::Igather),
                comm_kind: Some(CommKind::Inter),
                ..SelectionRule::new(Algorithm::IgatherInterSchedAuto)
            },
        ]
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: TuningFile = serde_json::from_str(json)?;
        Ok(Self::new(file.rules))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn rules(&self) -> &[SelectionRule] {
        &self.rules
    }
}

impl CollSelector for TableSelector {
    fn search(&self, sig: &CollSignature<'_>) -> Option<Algorithm> {
        let hit = self.rules.iter().find(|r| r.matches(sig)).map(|r| r.algorithm);
        trace!(coll = ?sig.coll(), msg_size = sig.msg_size(), ?hit, "selector search");
        hit
    }
}
