pub mod booking;
pub mod conflict;

pub use booking::BookingService;
pub use conflict::{intervals_overlap, ConflictDetectionService};
