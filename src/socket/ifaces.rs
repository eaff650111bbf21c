use crate::addr::ResolvedAddress;
use crate::error::{ListenerError, Result, errno};

/// One address reported by interface enumeration.
#[derive(Debug, Clone)]
pub struct InterfaceAddress {
    /// Interface name as reported by the OS (e.g. `eth0`).
    pub name: String,
    /// The interface's address. Port is meaningless here; the
    /// orchestrator overwrites it.
    pub addr: ResolvedAddress,
}

/// Access to the platform's interface-enumeration capability.
///
/// The orchestrators take this as a seam: hosts without a getifaddrs
/// equivalent plug in [`NoInterfaceSupport`], tests plug in
/// synthetic address lists.
pub trait InterfaceSource {
    /// False when enumeration is unavailable on this platform.
    fn available(&self) -> bool {
        true
    }

    /// Enumerates local interface addresses. Only IPv4 and IPv6
    /// entries are meaningful to the bind sequence; implementations
    /// may pre-filter other families.
    fn local_addresses(&self) -> Result<Vec<InterfaceAddress>>;
}

/// getifaddrs-backed enumeration.
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn local_addresses(&self) -> Result<Vec<InterfaceAddress>> {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if unsafe { libc::getifaddrs(&mut ifaddrs) } != 0 || ifaddrs.is_null() {
            return Err(ListenerError::EnumerateInterfaces { errno: errno() });
        }
        let mut entries = Vec::new();
        let mut cursor = ifaddrs;
        while !cursor.is_null() {
            let entry = unsafe { &*cursor };
            cursor = entry.ifa_next;
            if entry.ifa_addr.is_null() {
                continue;
            }
            let family = unsafe { (*entry.ifa_addr).sa_family } as libc::c_int;
            let len = match family {
                libc::AF_INET => std::mem::size_of::<libc::sockaddr_in>(),
                libc::AF_INET6 => std::mem::size_of::<libc::sockaddr_in6>(),
                _ => continue,
            } as libc::socklen_t;
            let name = if entry.ifa_name.is_null() {
                String::from("<unknown>")
            } else {
                unsafe { std::ffi::CStr::from_ptr(entry.ifa_name) }
                    .to_string_lossy()
                    .into_owned()
            };
            if let Some(addr) = unsafe { ResolvedAddress::from_sockaddr(entry.ifa_addr, len) } {
                entries.push(InterfaceAddress { name, addr });
            }
        }
        unsafe { libc::freeifaddrs(ifaddrs) };
        Ok(entries)
    }
}

/// Stub for platforms without interface enumeration.
///
/// Every enumeration-dependent operation fails with a capability
/// error instead of attempting a partial answer.
pub struct NoInterfaceSupport;

impl InterfaceSource for NoInterfaceSupport {
    fn available(&self) -> bool {
        false
    }

    fn local_addresses(&self) -> Result<Vec<InterfaceAddress>> {
        Err(ListenerError::Capability {
            operation: "interface enumeration",
        })
    }
}
