pub mod clock;
pub mod range;
