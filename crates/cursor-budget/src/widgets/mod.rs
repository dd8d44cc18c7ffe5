//! TUI widget modules

pub mod chart;
pub mod header;
pub mod popup;
pub mod progress_bars;
pub mod shortcuts;
pub mod statistics;

pub use chart::*;
pub use header::*;
pub use popup::*;
pub use progress_bars::*;
pub use shortcuts::*;
pub use statistics::*;
