use thiserror::Error;

/// Setup errors. Every variant is raised while building a detector, never
/// while frames are being processed.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    #[error("block size {block_size} gives {bins} bins, need more than {needed}")]
    BlockTooSmall {
        block_size: usize,
        bins: usize,
        needed: usize,
    },
    #[error("block size {block_size} is not divisible into {steps} analysis steps")]
    UnevenSteps { block_size: usize, steps: usize },
    #[error("band [{low}, {high}) is empty")]
    EmptyBand { low: usize, high: usize },
    #[error("template has {template} cells but the history buffer holds {buffer}")]
    TemplateSize { template: usize, buffer: usize },
    #[error("template shape invalid: {0}")]
    TemplateShape(String),
    #[error("low pass weight {0} is outside (0, 1]")]
    InvalidWeight(f32),
    #[error("shift range [-{up}, {down}) is empty")]
    ShiftRange { up: usize, down: usize },
    #[error("start bin {start_bin} is not below the template height {height}")]
    StartBin { start_bin: usize, height: usize },
    #[error("failed to parse template: {0}")]
    TemplateParse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
