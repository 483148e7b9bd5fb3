use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto::GrabStatus;

/// Why exclusive pointer control could not be taken.
#[derive(Error, Debug)]
pub enum GrabError {
    #[error("grab refused with status {0:?}")]
    Refused(GrabStatus),

    #[error("grab request failed: {0}")]
    Request(#[from] ReplyOrIdError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to connect to display: {0}")]
    Connect(#[from] ConnectError),

    #[error("can't grab the mouse: {0}")]
    Grab(#[from] GrabError),

    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("X11 request failed: {0}")]
    Reply(#[from] ReplyError),
}

impl Error {
    /// Process exit code for a run that stopped on this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Connect(_) => 7,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_failure_exits_with_seven() {
        let err = Error::Connect(ConnectError::UnknownError);
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn other_failures_exit_with_one() {
        assert_eq!(Error::from(GrabError::Refused(GrabStatus::FROZEN)).exit_code(), 1);
        assert_eq!(Error::Connection(ConnectionError::UnknownError).exit_code(), 1);
    }

    #[test]
    fn failed_grab_request_is_a_grab_error() {
        let err = Error::from(GrabError::from(ReplyOrIdError::ConnectionError(
            ConnectionError::UnknownError,
        )));
        assert!(matches!(err, Error::Grab(GrabError::Request(_))));
        assert!(err.to_string().starts_with("can't grab the mouse"));
    }
}
