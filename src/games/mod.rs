pub mod quick_three;
pub mod types;

pub use quick_three::{DiceOutcome, WagerResolution};
pub use types::*;
