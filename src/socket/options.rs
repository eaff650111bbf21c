use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::OnceLock;

use crate::addr::Family;
use crate::error::{ListenerError, Result, errno};

fn set_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	value: libc::c_int,
	option: &'static str,
) -> Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&value as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(ListenerError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Essential for server restarts.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_int_option(
		socket,
		libc::SOL_SOCKET,
		libc::SO_REUSEADDR,
		enable as libc::c_int,
		"SO_REUSEADDR",
	)
}

/// Sets SO_REUSEPORT on a socket.
///
/// Allows multiple sockets to bind the same port.
/// Used for load balancing across threads/processes.
pub fn set_reuse_port<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_int_option(
		socket,
		libc::SOL_SOCKET,
		libc::SO_REUSEPORT,
		enable as libc::c_int,
		"SO_REUSEPORT",
	)
}

/// Sets TCP_NODELAY on a socket.
///
/// Disables Nagle's algorithm — sends data immediately.
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_int_option(
		socket,
		libc::IPPROTO_TCP,
		libc::TCP_NODELAY,
		enable as libc::c_int,
		"TCP_NODELAY",
	)
}

/// Enables SO_ZEROCOPY transmission (Linux).
///
/// Old kernels reject the option; callers treat failure as advisory.
#[cfg(target_os = "linux")]
pub fn set_zero_copy<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_int_option(
		socket,
		libc::SOL_SOCKET,
		libc::SO_ZEROCOPY,
		enable as libc::c_int,
		"SO_ZEROCOPY",
	)
}

#[cfg(not(target_os = "linux"))]
pub fn set_zero_copy<S: AsRawFd>(_socket: &S, _enable: bool) -> Result<()> {
	Err(ListenerError::SetOption {
		errno: libc::ENOPROTOOPT,
		option: "SO_ZEROCOPY",
	})
}

/// Clears or sets IPV6_V6ONLY on an IPv6 socket.
///
/// Cleared, the socket also accepts IPv4 traffic via mapped
/// addresses (dual-stack).
pub fn set_v6_only<S: AsRawFd>(socket: &S, v6_only: bool) -> Result<()> {
	set_int_option(
		socket,
		libc::IPPROTO_IPV6,
		libc::IPV6_V6ONLY,
		v6_only as libc::c_int,
		"IPV6_V6ONLY",
	)
}

/// Applies a DSCP value to the traffic-class bits.
///
/// DSCP occupies the upper six bits of the TOS / traffic-class
/// octet. IPv6 sockets get both options so mapped IPv4 traffic is
/// marked too.
pub fn set_dscp<S: AsRawFd>(socket: &S, family: Family, dscp: u8) -> Result<()> {
	let value = (dscp as libc::c_int) << 2;
	match family {
		Family::Ipv4 => set_int_option(socket, libc::IPPROTO_IP, libc::IP_TOS, value, "IP_TOS"),
		Family::Ipv6 => {
			set_int_option(
				socket,
				libc::IPPROTO_IPV6,
				libc::IPV6_TCLASS,
				value,
				"IPV6_TCLASS",
			)?;
			set_int_option(socket, libc::IPPROTO_IP, libc::IP_TOS, value, "IP_TOS")
		}
		_ => Ok(()),
	}
}

/// Sets TCP_USER_TIMEOUT — how long transmitted data may remain
/// unacknowledged before the connection is closed (Linux).
#[cfg(target_os = "linux")]
pub fn set_tcp_user_timeout<S: AsRawFd>(socket: &S, timeout: std::time::Duration) -> Result<()> {
	let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
	set_int_option(
		socket,
		libc::IPPROTO_TCP,
		libc::TCP_USER_TIMEOUT,
		millis,
		"TCP_USER_TIMEOUT",
	)
}

#[cfg(not(target_os = "linux"))]
pub fn set_tcp_user_timeout<S: AsRawFd>(
	_socket: &S,
	_timeout: std::time::Duration,
) -> Result<()> {
	Err(ListenerError::SetOption {
		errno: libc::ENOPROTOOPT,
		option: "TCP_USER_TIMEOUT",
	})
}

/// Suppresses SIGPIPE generation on send, where the platform wants
/// it set per-socket. Linux uses MSG_NOSIGNAL at send time instead,
/// so this is a no-op there.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn set_no_sigpipe<S: AsRawFd>(socket: &S) -> Result<()> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1, "SO_NOSIGPIPE")
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub fn set_no_sigpipe<S: AsRawFd>(_socket: &S) -> Result<()> {
	Ok(())
}

/// Sets the socket to non-blocking mode.
///
/// Required for use with epoll/io_uring.
pub fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(ListenerError::SetOption { errno: errno(), option: "F_GETFL" });
	}
	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };
	if result == -1 {
		return Err(ListenerError::SetOption { errno: errno(), option: "O_NONBLOCK" });
	}
	Ok(())
}

/// Marks the socket close-on-exec.
pub fn set_cloexec<S: AsRawFd>(socket: &S, cloexec: bool) -> Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFD) };
	if flags == -1 {
		return Err(ListenerError::SetOption { errno: errno(), option: "F_GETFD" });
	}
	let new_flags = if cloexec {
		flags | libc::FD_CLOEXEC
	} else {
		flags & !libc::FD_CLOEXEC
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFD, new_flags) };
	if result == -1 {
		return Err(ListenerError::SetOption { errno: errno(), option: "FD_CLOEXEC" });
	}
	Ok(())
}

/// Whether SO_REUSEPORT can actually be set on this host.
///
/// Probed once with a throwaway socket and cached; the answer never
/// changes within a process.
pub fn is_reuse_port_supported() -> bool {
	static SUPPORTED: OnceLock<bool> = OnceLock::new();
	*SUPPORTED.get_or_init(|| {
		let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
		if fd == -1 {
			return false;
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };
		set_reuse_port(&fd, true).is_ok()
	})
}

/// Whether the host has a usable IPv4 transport.
pub fn is_ipv4_available() -> bool {
	static AVAILABLE: OnceLock<bool> = OnceLock::new();
	*AVAILABLE.get_or_init(|| {
		let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
		if fd == -1 {
			return false;
		}
		unsafe { libc::close(fd) };
		true
	})
}
