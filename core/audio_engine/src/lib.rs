pub mod constants;
pub mod convert;
pub mod device;
pub mod export;
pub mod player;
pub mod provider;
pub mod volume;
