//! Notification router: mirrored case notes, outbound messages, duplicate
//! suppression, and the delivery audit trail.

pub mod dedup;
pub mod router;
pub mod templates;

pub use router::{resolve_destination, Destination, MessageSender, NotificationRouter, RouteResult};
pub use templates::mask_national_id;
