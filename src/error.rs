/// Listener setup errors.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind('{addr}') failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockname() failed: {}", errno_to_str(*.errno))]
    GetName { errno: i32 },

    #[error("getifaddrs() failed: {}", errno_to_str(*.errno))]
    EnumerateInterfaces { errno: i32 },

    #[error("socket mutator failed: {error}")]
    Mutator { error: std::io::Error },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    #[error("failed to add listener for {addr}: {source}")]
    AddListener {
        addr: String,
        source: Box<ListenerError>,
    },

    #[error("failed to add any wildcard listeners: {v6_error}; {v4_error}")]
    WildcardBind { v6_error: String, v4_error: String },

    #[error("no local addresses to bind")]
    NoAddresses,

    #[error("{operation} is not supported on this platform")]
    Capability { operation: &'static str },

    #[error("protocol violation: {reason}")]
    Protocol { reason: String },
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ListenerError>;

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENFILE => "file table overflow".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOPROTOOPT => "protocol option not available".into(),
        libc::EOPNOTSUPP => "operation not supported".into(),
        libc::EPERM => "operation not permitted".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN | libc::EWOULDBLOCK => std::io::ErrorKind::WouldBlock,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::EAFNOSUPPORT => std::io::ErrorKind::Unsupported,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<ListenerError> for std::io::Error {
    fn from(err: ListenerError) -> Self {
        let kind = match &err {
            ListenerError::Create { errno } => errno_to_kind(*errno),
            ListenerError::Bind { errno, .. } => errno_to_kind(*errno),
            ListenerError::Listen { errno, .. } => errno_to_kind(*errno),
            ListenerError::SetOption { errno, .. } => errno_to_kind(*errno),
            ListenerError::GetName { errno } => errno_to_kind(*errno),
            ListenerError::EnumerateInterfaces { errno } => errno_to_kind(*errno),
            ListenerError::Mutator { error } => error.kind(),
            ListenerError::InvalidAddress { .. } => std::io::ErrorKind::InvalidInput,
            ListenerError::AddListener { source, .. } => match source.as_ref() {
                ListenerError::Bind { errno, .. } => errno_to_kind(*errno),
                _ => std::io::ErrorKind::Other,
            },
            ListenerError::WildcardBind { .. } => std::io::ErrorKind::AddrNotAvailable,
            ListenerError::NoAddresses => std::io::ErrorKind::AddrNotAvailable,
            ListenerError::Capability { .. } => std::io::ErrorKind::Unsupported,
            ListenerError::Protocol { .. } => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
