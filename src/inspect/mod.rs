//! Read-only inspection and admin tooling
//!
//! Statistics, item detail and listings, plus resets that move an item to
//! an earlier stage. Nothing here ever moves an item forward.

mod items;
mod stats;

pub use items::{apply_reset, print_item, print_listing, ContentView, ResetKind};
pub use stats::{load_statistics, print_statistics, RelayStatistics};
