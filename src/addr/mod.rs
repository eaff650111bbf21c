//! Socket addresses as the kernel sees them.
//!
//! This module defines the runtime address model used by the bind
//! sequence:
//! - `Family` — the address family tag read from a raw sockaddr
//! - `ResolvedAddress` — an opaque sockaddr_storage plus its length
//!
//! Unlike a typed per-family API, interface enumeration hands us
//! addresses whose family is only known at runtime, so everything
//! downstream works on `ResolvedAddress` values.

mod resolved;
pub use self::resolved::ResolvedAddress;

/// Address family of a `ResolvedAddress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	/// Internet Protocol version 4.
	Ipv4,
	/// Internet Protocol version 6.
	Ipv6,
	/// Unix domain sockets (local only).
	Unix,
	/// VM sockets (host/guest, Linux only).
	Vsock,
	/// Anything else the kernel may report (AF_PACKET etc.).
	Other(libc::c_int),
}
