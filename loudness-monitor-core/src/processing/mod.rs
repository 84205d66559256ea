pub mod loudness;
pub mod sample_window;
pub mod tiers;
