//! State module for tracking item progress
//!
//! An item's stage is derived from its stage timestamps; it is never stored
//! as a column of its own.

mod item_stage;

pub use item_stage::ItemStage;
