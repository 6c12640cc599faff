#[derive(Debug)]
pub enum EngineError {
    InvalidGranularity(i64),
    InvalidDuration(i64),
    InvalidHorizon(i64),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidGranularity(g) => {
                write!(f, "granularity out of range: {g} minutes")
            }
            EngineError::InvalidDuration(d) => {
                write!(f, "service duration out of range: {d} minutes")
            }
            EngineError::InvalidHorizon(h) => write!(f, "horizon out of range: {h} days"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
