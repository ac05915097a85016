use thiserror::Error;

use pinned_memory::RegistryError;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("staging buffer could not grow to {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("pinned memory error: {0}")]
    Registry(#[from] RegistryError),
}
