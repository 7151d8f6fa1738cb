// Re-export all model types from submodules.

pub use app::Pane;
pub use metrics::{DiskCounters, MetricSample, Reading};
pub use output::{LineBuffer, ScriptOutputState, TerminalBuffer};

mod app;
mod metrics;
mod output;
