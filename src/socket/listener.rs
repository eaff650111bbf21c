use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};

use crate::addr::{Family, ResolvedAddress};
use crate::error::{ListenerError, Result, errno};
use crate::socket::backlog::max_accept_queue_size;
use crate::socket::bind_options::BindOptions;
use crate::socket::options::{
    is_reuse_port_supported, set_cloexec, set_dscp, set_no_sigpipe, set_nonblocking,
    set_reuse_addr, set_reuse_port, set_tcp_nodelay, set_tcp_user_timeout, set_v6_only,
    set_zero_copy,
};

/// How a listening socket relates to the two IP families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsMode {
    /// Not an IP socket (Unix domain, VSOCK).
    None,
    /// IPv4 traffic only — an AF_INET socket, including the
    /// downgrade taken when no IPv6 stack exists.
    Ipv4,
    /// An IPv6 socket that refuses mapped IPv4 traffic.
    Ipv6,
    /// An IPv6 socket that also accepts IPv4 via mapped addresses.
    DualStack,
}

/// One bound, listening OS socket.
///
/// Owns its file descriptor exclusively; dropping the value closes
/// the socket. Values are only ever constructed fully prepared — a
/// `ListenerSocket` you can observe is already listening and its
/// `port()` is nonzero.
pub struct ListenerSocket {
    fd: OwnedFd,
    addr: ResolvedAddress,
    dsmode: DsMode,
    port: u16,
    zero_copy: bool,
}

impl ListenerSocket {
    /// The address this listener was bound with.
    pub fn addr(&self) -> &ResolvedAddress {
        &self.addr
    }

    /// The resolved dual-stack mode.
    pub fn dsmode(&self) -> DsMode {
        self.dsmode
    }

    /// The port actually assigned by the kernel. Unix and VSOCK
    /// listeners report 1, which only signals the listening state.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether zero-copy transmission was negotiated.
    pub fn zero_copy_enabled(&self) -> bool {
        self.zero_copy
    }

    /// Returns the raw file descriptor.
    ///
    /// Used for registering with a poller. Does not transfer
    /// ownership.
    #[inline]
    pub fn as_raw_fd(&self) -> libc::c_int {
        self.fd.as_raw_fd()
    }
}

impl std::os::fd::AsRawFd for ListenerSocket {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::os::fd::AsFd for ListenerSocket {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl std::os::fd::IntoRawFd for ListenerSocket {
    fn into_raw_fd(self) -> std::os::fd::RawFd {
        self.fd.into_raw_fd()
    }
}

impl std::fmt::Debug for ListenerSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSocket")
            .field("fd", &self.fd.as_raw_fd())
            .field("addr", &self.addr)
            .field("dsmode", &self.dsmode)
            .field("port", &self.port)
            .field("zero_copy", &self.zero_copy)
            .finish()
    }
}

/// Ordered collection of prepared listeners.
///
/// `append` takes ownership of a listening socket; `find` is the
/// membership test the enumeration path uses to skip duplicate
/// interface addresses. Synchronization, if any, is the caller's.
pub trait ListenerSockets {
    /// Takes ownership of a prepared socket.
    fn append(&mut self, socket: ListenerSocket);

    /// True iff an entry whose address compares equal exists.
    fn find(&self, addr: &ResolvedAddress) -> bool;
}

impl ListenerSockets for Vec<ListenerSocket> {
    fn append(&mut self, socket: ListenerSocket) {
        self.push(socket);
    }

    fn find(&self, addr: &ResolvedAddress) -> bool {
        self.iter().any(|socket| socket.addr() == addr)
    }
}

fn new_socket(family: libc::c_int) -> Result<OwnedFd> {
    let fd = unsafe { libc::socket(family, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd == -1 {
        return Err(ListenerError::Create { errno: errno() });
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Creates a stream socket for `addr`'s family, dual-stack where the
/// platform allows.
///
/// Returns the socket, the resolved mode, and the address to bind —
/// normalized to plain IPv4 when a v4-mapped input had to fall back
/// to an AF_INET socket.
fn create_dual_stack_socket(
    addr: &ResolvedAddress,
) -> Result<(OwnedFd, DsMode, ResolvedAddress)> {
    match addr.family() {
        Family::Unix => Ok((new_socket(libc::AF_UNIX)?, DsMode::None, *addr)),
        #[cfg(target_os = "linux")]
        Family::Vsock => Ok((new_socket(libc::AF_VSOCK)?, DsMode::None, *addr)),
        #[cfg(not(target_os = "linux"))]
        Family::Vsock => Err(ListenerError::Capability { operation: "VSOCK" }),
        Family::Ipv4 => Ok((new_socket(libc::AF_INET)?, DsMode::Ipv4, *addr)),
        Family::Ipv6 => match new_socket(libc::AF_INET6) {
            Ok(fd) => {
                // Dual-stack iff the kernel lets us clear v6-only.
                let dsmode = if set_v6_only(&fd, false).is_ok() {
                    DsMode::DualStack
                } else {
                    DsMode::Ipv6
                };
                Ok((fd, dsmode, *addr))
            }
            Err(_) => {
                // No IPv6 stack at all. Retry over IPv4; a mapped
                // literal keeps working under its plain v4 form.
                let bind_addr = addr.to_unmapped_v4().unwrap_or(*addr);
                Ok((new_socket(libc::AF_INET)?, DsMode::Ipv4, bind_addr))
            }
        },
        Family::Other(_) => Err(ListenerError::InvalidAddress {
            reason: "unsupported address family",
        }),
    }
}

/// Prepares a just-created socket: options, bind, listen, and the
/// read-back of the assigned port.
///
/// The fd stays owned by the caller's `OwnedFd`, so every early
/// return drops it closed; only a fully-listening socket survives.
fn prepare_socket(
    options: &BindOptions,
    fd: &OwnedFd,
    addr: &ResolvedAddress,
) -> Result<(u16, bool)> {
    let mut zero_copy = false;
    let inet = !addr.is_unix() && !addr.is_vsock();

    if is_reuse_port_supported() && options.allow_reuse_port && inet {
        set_reuse_port(fd, true)?;
    }

    match set_zero_copy(fd, true) {
        Ok(()) => zero_copy = true,
        Err(err) => {
            tracing::debug!("zero-copy transmission unavailable, continuing: {}", err);
        }
    }

    set_nonblocking(fd, true)?;
    set_cloexec(fd, true)?;

    if inet {
        set_tcp_nodelay(fd, true)?;
        set_reuse_addr(fd, true)?;
        if let Some(dscp) = options.dscp {
            set_dscp(fd, addr.family(), dscp)?;
        }
        if let Some(timeout) = options.tcp_user_timeout {
            if let Err(err) = set_tcp_user_timeout(fd, timeout) {
                tracing::debug!("TCP user timeout not applied: {}", err);
            }
        }
    }

    if let Err(err) = set_no_sigpipe(fd) {
        tracing::debug!("SIGPIPE suppression not applied: {}", err);
    }

    if let Some(mutator) = options.socket_mutator.as_deref() {
        mutator(fd.as_fd()).map_err(|error| ListenerError::Mutator { error })?;
    }

    let bound = addr.with_raw(|ptr, len| unsafe { libc::bind(fd.as_raw_fd(), ptr, len) });
    if bound == -1 {
        return Err(ListenerError::Bind {
            errno: errno(),
            addr: addr.to_string(),
        });
    }

    let backlog = max_accept_queue_size();
    if unsafe { libc::listen(fd.as_raw_fd(), backlog) } == -1 {
        return Err(ListenerError::Listen { errno: errno(), backlog });
    }

    let assigned = local_address(fd)?;
    let port = match assigned.family() {
        Family::Ipv4 | Family::Ipv6 => assigned.port(),
        // No port space; 1 marks the listening state.
        _ => 1,
    };
    Ok((port, zero_copy))
}

/// getsockname as a `ResolvedAddress`.
fn local_address(fd: &OwnedFd) -> Result<ResolvedAddress> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockname(
            fd.as_raw_fd(),
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
        )
    };
    if result == -1 {
        return Err(ListenerError::GetName { errno: errno() });
    }
    unsafe { ResolvedAddress::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
        .ok_or_else(|| ListenerError::Protocol {
            reason: "getsockname returned an unusable address".into(),
        })
}

/// Creates, configures, binds and activates one listening socket for
/// `addr`.
///
/// Dual-stack is selected automatically where the platform and
/// address allow it; a v4-mapped address that had to fall back to an
/// AF_INET socket is reported under its plain IPv4 form. On any
/// failure the socket is closed before the error propagates.
pub fn create_and_prepare_listener(
    options: &BindOptions,
    addr: &ResolvedAddress,
) -> Result<ListenerSocket> {
    let (fd, dsmode, addr) = create_dual_stack_socket(addr)?;
    let (port, zero_copy) = prepare_socket(options, &fd, &addr)?;
    if port == 0 {
        return Err(ListenerError::Protocol {
            reason: format!("listener for {} reported port 0", addr),
        });
    }
    Ok(ListenerSocket {
        fd,
        addr,
        dsmode,
        port,
        zero_copy,
    })
}

/// Finds a port no other socket is using, by letting the kernel
/// assign one to a throwaway bind on the IPv6 wildcard (IPv4 when
/// the host has no IPv6 stack).
///
/// The temporary socket is closed on every path; only the port
/// number survives.
pub fn find_unused_port() -> Result<u16> {
    let mut wild = ResolvedAddress::wildcard_v6(0);
    let (fd, dsmode, _) = create_dual_stack_socket(&wild)?;
    if dsmode == DsMode::Ipv4 {
        wild = ResolvedAddress::wildcard_v4(0);
    }
    let bound = wild.with_raw(|ptr, len| unsafe { libc::bind(fd.as_raw_fd(), ptr, len) });
    if bound == -1 {
        return Err(ListenerError::Bind {
            errno: errno(),
            addr: wild.to_string(),
        });
    }
    let assigned = local_address(&fd)?;
    let port = assigned.port();
    if port == 0 {
        return Err(ListenerError::Protocol {
            reason: "ephemeral bind reported port 0".into(),
        });
    }
    Ok(port)
}
