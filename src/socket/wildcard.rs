use crate::addr::{Family, ResolvedAddress};
use crate::error::{ListenerError, Result};
use crate::socket::bind_options::BindOptions;
use crate::socket::ifaces::{InterfaceSource, SystemInterfaces};
use crate::socket::listener::{
    DsMode, ListenerSockets, create_and_prepare_listener, find_unused_port,
};
use crate::socket::options::is_ipv4_available;

/// Binds one listener per eligible local interface address, all
/// sharing one port, and returns that port.
///
/// See [`add_all_local_addresses_with`] for the semantics; this
/// entry point uses the system's getifaddrs enumeration.
pub fn add_all_local_addresses<C: ListenerSockets>(
    sockets: &mut C,
    options: &BindOptions,
    requested_port: u16,
) -> Result<u16> {
    add_all_local_addresses_with(&SystemInterfaces, sockets, options, requested_port)
}

/// Interface-enumerating bind with an explicit capability source.
///
/// A requested port of 0 is first resolved to a concrete unused port
/// so every interface listener agrees. Enumeration skips non-IP
/// families, IPv4 entries on IPv4-less hosts, link-local addresses
/// when so configured, and addresses already present in the
/// container (bonded interfaces report one address twice). The first
/// listener failure stops enumeration and surfaces the failing
/// address; listeners appended before the failure stay in the
/// container for the caller to keep or discard.
pub fn add_all_local_addresses_with<I, C>(
    interfaces: &I,
    sockets: &mut C,
    options: &BindOptions,
    mut requested_port: u16,
) -> Result<u16>
where
    I: InterfaceSource + ?Sized,
    C: ListenerSockets,
{
    if !interfaces.available() {
        return Err(ListenerError::Capability {
            operation: "interface enumeration",
        });
    }
    if requested_port == 0 {
        requested_port = find_unused_port()?;
        tracing::debug!("picked unused port {}", requested_port);
    }
    let mut assigned_port = 0u16;
    for entry in interfaces.local_addresses()? {
        let mut addr = entry.addr;
        match addr.family() {
            Family::Ipv4 => {
                if !is_ipv4_available() {
                    continue;
                }
            }
            Family::Ipv6 => {}
            _ => continue,
        }
        addr.set_port(requested_port);
        if options.exclude_link_local_addresses && addr.is_link_local() {
            continue;
        }
        if sockets.find(&addr) {
            tracing::debug!(
                "skipping duplicate address {} on interface {}",
                addr,
                entry.name
            );
            continue;
        }
        tracing::debug!("adding local address {} from interface {}", addr, entry.name);
        match create_and_prepare_listener(options, &addr) {
            Ok(socket) => {
                assigned_port = socket.port();
                sockets.append(socket);
            }
            Err(err) => {
                return Err(ListenerError::AddListener {
                    addr: addr.to_string(),
                    source: Box::new(err),
                });
            }
        }
    }
    if assigned_port == 0 {
        return Err(ListenerError::NoAddresses);
    }
    Ok(assigned_port)
}

/// Binds the wildcard addresses and returns the assigned port.
///
/// See [`add_wildcard_addresses_with`]; this entry point uses the
/// system's getifaddrs enumeration for the expansion case.
pub fn add_wildcard_addresses<C: ListenerSockets>(
    sockets: &mut C,
    options: &BindOptions,
    requested_port: u16,
) -> Result<u16> {
    add_wildcard_addresses_with(&SystemInterfaces, sockets, options, requested_port)
}

/// Wildcard bind with an explicit capability source.
///
/// With enumeration available and expansion requested, delegates to
/// [`add_all_local_addresses_with`]. Otherwise IPv6 goes first: one
/// dual-stack `[::]` socket serves both families, and a downgrade to
/// IPv4-only means there is no IPv6 stack left to complement, so
/// either way a single socket suffices. Only a v6-only socket (or an
/// outright v6 failure) adds the `0.0.0.0` attempt at the same port.
/// One surviving family is success; its sibling's failure is logged,
/// not raised. Both failing aggregates both causes into the error.
pub fn add_wildcard_addresses_with<I, C>(
    interfaces: &I,
    sockets: &mut C,
    options: &BindOptions,
    mut requested_port: u16,
) -> Result<u16>
where
    I: InterfaceSource + ?Sized,
    C: ListenerSockets,
{
    if interfaces.available() && options.expand_wildcard_addresses {
        return add_all_local_addresses_with(interfaces, sockets, options, requested_port);
    }

    let mut assigned_port = 0u16;
    let v6_error;
    match create_and_prepare_listener(options, &ResolvedAddress::wildcard_v6(requested_port)) {
        Ok(socket) => {
            requested_port = socket.port();
            assigned_port = socket.port();
            let dsmode = socket.dsmode();
            sockets.append(socket);
            if dsmode == DsMode::DualStack || dsmode == DsMode::Ipv4 {
                return Ok(assigned_port);
            }
            v6_error = None;
        }
        Err(err) => v6_error = Some(err),
    }

    // v6-only socket or no v6 at all: also try 0.0.0.0.
    let v4_error;
    match create_and_prepare_listener(options, &ResolvedAddress::wildcard_v4(requested_port)) {
        Ok(socket) => {
            assigned_port = socket.port();
            sockets.append(socket);
            v4_error = None;
        }
        Err(err) => v4_error = Some(err),
    }

    if assigned_port > 0 {
        if let Some(err) = &v6_error {
            tracing::debug!(
                "failed to add [::] listener, the environment may not support IPv6: {}",
                err
            );
        }
        if let Some(err) = &v4_error {
            tracing::debug!(
                "failed to add 0.0.0.0 listener, the environment may not support IPv4: {}",
                err
            );
        }
        return Ok(assigned_port);
    }

    Err(ListenerError::WildcardBind {
        v6_error: v6_error.map(|e| e.to_string()).unwrap_or_default(),
        v4_error: v4_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}
