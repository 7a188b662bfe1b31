use std::fmt;

/// Exit status for every failure, usage or runtime.
pub const FAILURE_EXIT_CODE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidPort,
    Resolve,
    Connect,
    Timeout,
    TlsSetup,
    Handshake,
    Write,
    Read,
    Output,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::InvalidPort => "invalid port",
            FailureKind::Resolve => "resolve failed",
            FailureKind::Connect => "connect failed",
            FailureKind::Timeout => "timed out",
            FailureKind::TlsSetup => "tls setup failed",
            FailureKind::Handshake => "handshake failed",
            FailureKind::Write => "write failed",
            FailureKind::Read => "read failed",
            FailureKind::Output => "output failed",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug)]
pub enum ProbeError {
    Usage(String),
    Runtime {
        kind: FailureKind,
        source: anyhow::Error,
    },
}

impl ProbeError {
    pub fn runtime(kind: FailureKind, source: impl Into<anyhow::Error>) -> Self {
        ProbeError::Runtime {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ProbeError::Usage(_) => None,
            ProbeError::Runtime { kind, .. } => Some(*kind),
        }
    }

    pub fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Usage(message) => write!(f, "{}", message.trim_end()),
            ProbeError::Runtime { kind, source } => write!(f, "{kind}: {source:#}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Usage(_) => None,
            ProbeError::Runtime { source, .. } => Some(&**source),
        }
    }
}

/// Tags a fallible step with the stage it belongs to.
pub trait StageExt<T> {
    fn stage(self, kind: FailureKind) -> Result<T, ProbeError>;
}

impl<T, E> StageExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn stage(self, kind: FailureKind) -> Result<T, ProbeError> {
        self.map_err(|err| ProbeError::runtime(kind, err))
    }
}
