use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("transport closed")]
    Closed,

    #[error("unknown message type {0}")]
    BadType(u32),

    #[error("identifier field is not valid UTF-8")]
    BadText,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error("header is missing its terminating colon")]
    TruncatedHeader,

    #[error("header exceeds {0} bytes")]
    HeaderTooLong(usize),

    #[error("bad header field: {0}")]
    BadField(String),

    #[error("bad filename: {0}")]
    BadFilename(String),

    #[error("payload shorter than declared size ({declared} declared, {actual} present)")]
    ShortPayload { declared: usize, actual: usize },
}
