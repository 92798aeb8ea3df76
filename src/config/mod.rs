//! Configuration read once at runtime init.
//!
//! - [`options`]: collective algorithm selection ([`CollOptions`]).
//! - [`offload`]: hardware collective offload environment ([`OffloadConfig`]).

pub mod offload;
pub mod options;

pub use offload::OffloadConfig;
pub use options::{CollOptions, DeviceCollectives, IgatherInterAlgorithm, IgatherIntraAlgorithm};
