use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    ExitStatus { command: String, status: ExitStatus },
}

pub type Result<T> = std::result::Result<T, Error>;
