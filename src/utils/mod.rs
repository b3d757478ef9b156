pub mod logger;
pub mod race;
