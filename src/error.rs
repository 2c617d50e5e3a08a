use thiserror::Error;

/// Terminal conditions of a render pass that the caller must surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No order survives the current filter combination.
    #[error("no data matches the selected filters; adjust the selection")]
    EmptyView,

    /// Top-N control outside 5..=50 or off the step of 5.
    #[error("top-N must be a multiple of 5 between 5 and 50, got {0}")]
    InvalidTopN(u32),
}
