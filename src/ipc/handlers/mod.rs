pub mod core;
pub mod delivery;
pub mod stats;
pub mod submissions;
