pub mod clock;
pub mod phone;
pub mod time;

pub use clock::{Clock, FixedClock, SystemClock};
pub use phone::normalize_phone_e164;
pub use time::{add_minutes, CivilParts, TimeError, TimeNormalizer};
