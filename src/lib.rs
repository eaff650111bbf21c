pub mod socket;
mod addr;
mod error;

pub use self::error::{ListenerError, Result, errno};
pub use self::addr::{Family, ResolvedAddress};
pub use self::socket::{BindOptions, SocketMutator, DsMode, ListenerSocket, ListenerSockets,
					   InterfaceAddress, InterfaceSource, SystemInterfaces, NoInterfaceSupport,
					   create_and_prepare_listener, find_unused_port, max_accept_queue_size,
					   add_all_local_addresses, add_all_local_addresses_with,
					   add_wildcard_addresses, add_wildcard_addresses_with};
pub use self::socket::{set_reuse_addr, set_reuse_port, set_tcp_nodelay,
					   set_dscp, set_zero_copy, set_v6_only, set_tcp_user_timeout,
					   set_no_sigpipe, set_nonblocking, set_cloexec,
					   is_reuse_port_supported, is_ipv4_available};
