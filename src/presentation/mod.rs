// Presentation layer - Terminal rendering of metrics snapshots
pub mod terminal_display;
