use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown city id: {0}")]
    UnknownCity(String),
    #[error("city id must not be empty")]
    EmptyCityId,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::User
    }
}
