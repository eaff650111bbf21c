use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied hook run on each socket after option setup and
/// before bind. A failure aborts the whole preparation.
pub type SocketMutator = Arc<dyn Fn(BorrowedFd<'_>) -> std::io::Result<()> + Send + Sync>;

/// Configuration for a bind sequence.
///
/// Read-only for the duration of a bind; clone it to vary settings
/// between sequences.
///
/// # Example
/// ```ignore
/// use bindlane::BindOptions;
///
/// let options = BindOptions::new()
///     .reuse_port(true)
///     .exclude_link_local(true)
///     .dscp(10);
/// ```
#[derive(Clone, Default)]
pub struct BindOptions {
	/// Enable SO_REUSEPORT on every listener (where supported).
	pub allow_reuse_port: bool,
	/// Bind each interface address individually instead of the
	/// wildcard addresses.
	pub expand_wildcard_addresses: bool,
	/// Skip link-local addresses during interface enumeration.
	pub exclude_link_local_addresses: bool,
	/// DSCP value for outgoing traffic classification.
	pub dscp: Option<u8>,
	/// TCP_USER_TIMEOUT policy; applied best-effort.
	pub tcp_user_timeout: Option<Duration>,
	/// Hook run on each socket before bind.
	pub socket_mutator: Option<SocketMutator>,
}

impl BindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reuse_port(mut self, enable: bool) -> Self {
		self.allow_reuse_port = enable;
		self
	}

	pub fn expand_wildcards(mut self, enable: bool) -> Self {
		self.expand_wildcard_addresses = enable;
		self
	}

	pub fn exclude_link_local(mut self, enable: bool) -> Self {
		self.exclude_link_local_addresses = enable;
		self
	}

	pub fn dscp(mut self, value: u8) -> Self {
		self.dscp = Some(value);
		self
	}

	pub fn tcp_user_timeout(mut self, timeout: Duration) -> Self {
		self.tcp_user_timeout = Some(timeout);
		self
	}

	pub fn socket_mutator<F>(mut self, mutator: F) -> Self
	where
		F: Fn(BorrowedFd<'_>) -> std::io::Result<()> + Send + Sync + 'static,
	{
		self.socket_mutator = Some(Arc::new(mutator));
		self
	}
}

impl std::fmt::Debug for BindOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindOptions")
			.field("allow_reuse_port", &self.allow_reuse_port)
			.field("expand_wildcard_addresses", &self.expand_wildcard_addresses)
			.field("exclude_link_local_addresses", &self.exclude_link_local_addresses)
			.field("dscp", &self.dscp)
			.field("tcp_user_timeout", &self.tcp_user_timeout)
			.field("socket_mutator", &self.socket_mutator.as_ref().map(|_| "<fn>"))
			.finish()
	}
}
