mod backlog;
mod bind_options;
mod ifaces;
mod listener;
mod options;
mod wildcard;

pub use self::backlog::max_accept_queue_size;
pub use self::bind_options::{BindOptions, SocketMutator};
pub use self::ifaces::{InterfaceAddress, InterfaceSource, NoInterfaceSupport, SystemInterfaces};
pub use self::listener::{DsMode, ListenerSocket, ListenerSockets,
						 create_and_prepare_listener, find_unused_port};
pub use self::options::{set_reuse_addr, set_reuse_port, set_tcp_nodelay,
						set_dscp, set_zero_copy, set_v6_only, set_tcp_user_timeout,
						set_no_sigpipe, set_nonblocking, set_cloexec,
						is_reuse_port_supported, is_ipv4_available};
pub use self::wildcard::{add_all_local_addresses, add_all_local_addresses_with,
						 add_wildcard_addresses, add_wildcard_addresses_with};
