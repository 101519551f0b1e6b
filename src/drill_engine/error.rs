use thiserror::Error;

/// Failures surfaced to callers. A generation shortfall returns fewer
/// questions and persistence trouble falls back to defaults, so neither
/// shows up here.
#[derive(Error, Debug)]
pub enum DrillError {
    #[error("Curriculum not found: {0}")]
    UnknownTrack(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Stage id appears in more than one curriculum: {0}")]
    DuplicateStage(String),

    #[error("No curriculum tracks to load")]
    NoTracks,

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DrillError>;
