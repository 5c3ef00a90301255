//! pitcrew-store: artifact storage, cache lookups, and expiring tickets
//!
//! Owns the object path scheme shared with the build worker, the
//! filesystem-backed artifact store, and the download/upload ticket issuer.

pub mod artifacts;
pub mod paths;
pub mod tickets;
pub mod tools;

pub use artifacts::ArtifactStore;
pub use paths::{asset_bundle_path, asset_object_path, asset_prefix, build_object_path};
pub use tickets::{Ticket, TicketIssuer, TicketMethod, UploadTicket};
