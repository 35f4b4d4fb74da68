pub mod red_flags;

pub use red_flags::{RedFlagReport, RedFlagScreen, RED_FLAG_KEYWORDS};
