use engine::EngineError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("no country selected")]
    NoCountrySelected,
    #[error("unknown country {0:?}")]
    UnknownCountry(String),
    #[error("level {level} is not available for {country}")]
    LevelUnavailable { country: String, level: u8 },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    /// Whether the failure blocks further interaction until reload.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Engine(EngineError::InitFailed(_)))
    }
}
