use thiserror::Error;

use crate::model::{AttemptError, ParseIdError, PartError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Part(#[from] PartError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
