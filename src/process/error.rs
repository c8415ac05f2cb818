use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("`{0}` not piped")]
    StreamPipeError(String),

    #[error("`{0}`")]
    IoError(#[from] std::io::Error),

    #[error("signal error: `{0}`")]
    NixError(String),
}
