//! Core identifiers, process groups, endpoints and collaborator traits.
//!
//! Everything in this module is shared by the communicator layer and the collective
//! dispatch layer. The traits in [`traits`] describe the external collaborators this
//! crate drives (point-to-point transport and progress engine) without implementing them.

pub mod traits;
pub mod types;

pub use traits::{Progress, Transport};
pub use types::{ContextId, Endpoint, Group, ProcessGroup, VcState, VirtualConnection};
