use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Errors raised by the remote-service and file-processing layers.
///
/// Command handlers wrap these in `anyhow` with extra context; batch loops
/// log them and move on to the next item.
#[derive(Debug, Error)]
pub enum LakeError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("FTP transfer of {url} failed: {source}")]
    Ftp {
        url: String,
        #[source]
        source: suppaftp::FtpError,
    },

    #[error("unsupported download URL: {0}")]
    UnsupportedScheme(String),

    #[error("object store: {0}")]
    Store(String),

    #[error("mail: {0}")]
    Mail(String),

    #[error("{program} failed: {status}")]
    Process {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = LakeError> = std::result::Result<T, E>;

impl LakeError {
    /// Wrap a transport error together with the URL that produced it.
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        LakeError::Http {
            url: url.into(),
            source,
        }
    }
}
