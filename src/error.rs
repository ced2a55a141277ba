#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server on {addr} failed: {source}")]
    Serve {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultOkLogExt<T, E> {
    /// Converts to an `Option`, logging the error at debug level.
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::debug!("{err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log() {
        let ok: std::result::Result<u8, std::io::Error> = Ok(3);
        assert_eq!(ok.ok_log(), Some(3));
        let err: std::result::Result<u8, std::io::Error> =
            Err(std::io::Error::other("unavailable"));
        assert_eq!(err.ok_log(), None);
    }

    #[test]
    fn test_bind_message() {
        let err = Error::Bind {
            addr: "0.0.0.0:9002".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("failed to bind 0.0.0.0:9002"));
    }
}
