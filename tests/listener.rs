use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindlane::{
    BindOptions, DsMode, Family, InterfaceAddress, InterfaceSource, ListenerError,
    ListenerSocket, ListenerSockets, NoInterfaceSupport, ResolvedAddress,
    add_all_local_addresses, add_all_local_addresses_with, add_wildcard_addresses,
    add_wildcard_addresses_with,
    create_and_prepare_listener, find_unused_port, max_accept_queue_size,
};

fn addr(s: &str) -> ResolvedAddress {
    ResolvedAddress::from(s.parse::<SocketAddr>().unwrap())
}

/// Synthetic enumeration results, standing in for getifaddrs.
struct FakeInterfaces(Vec<InterfaceAddress>);

impl FakeInterfaces {
    fn new(entries: &[(&str, ResolvedAddress)]) -> Self {
        Self(
            entries
                .iter()
                .map(|(name, addr)| InterfaceAddress {
                    name: name.to_string(),
                    addr: *addr,
                })
                .collect(),
        )
    }
}

impl InterfaceSource for FakeInterfaces {
    fn local_addresses(&self) -> bindlane::Result<Vec<InterfaceAddress>> {
        Ok(self.0.clone())
    }
}

#[test]
fn accept_queue_size_is_positive_and_stable() {
    let first = max_accept_queue_size();
    assert!(first > 0);
    assert_eq!(first, max_accept_queue_size());
}

#[test]
fn unused_port_is_nonzero() {
    let port = find_unused_port().unwrap();
    assert!(port > 0);
}

#[test]
fn loopback_v4_listener_gets_a_port() {
    let socket = create_and_prepare_listener(&BindOptions::new(), &addr("127.0.0.1:0")).unwrap();
    assert!(socket.port() > 0);
    assert_eq!(socket.dsmode(), DsMode::Ipv4);
    assert_eq!(socket.addr().family(), Family::Ipv4);
}

#[test]
fn wildcard_v6_listener_reports_its_stack_mode() {
    match create_and_prepare_listener(&BindOptions::new(), &ResolvedAddress::wildcard_v6(0)) {
        Ok(socket) => {
            assert!(socket.port() > 0);
            assert!(matches!(socket.dsmode(), DsMode::DualStack | DsMode::Ipv6));
        }
        // Hosts with the IPv6 stack disabled cannot create this
        // listener at all; the wildcard orchestrator covers them.
        Err(_) => {}
    }
}

#[test]
fn rebinding_an_active_address_fails_with_bind_error() {
    let options = BindOptions::new();
    let first = create_and_prepare_listener(&options, &addr("127.0.0.1:0")).unwrap();
    let mut taken = addr("127.0.0.1:0");
    taken.set_port(first.port());
    let err = create_and_prepare_listener(&options, &taken).unwrap_err();
    assert!(matches!(err, ListenerError::Bind { .. }));
    assert!(err.to_string().contains("127.0.0.1"));
}

#[test]
fn reuse_port_allows_rebinding() {
    let options = BindOptions::new().reuse_port(true);
    let first = create_and_prepare_listener(&options, &addr("127.0.0.1:0")).unwrap();
    let mut taken = addr("127.0.0.1:0");
    taken.set_port(first.port());
    let second = create_and_prepare_listener(&options, &taken).unwrap();
    assert_eq!(second.port(), first.port());
}

#[test]
fn mutator_runs_on_the_unbound_socket() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let options = BindOptions::new().socket_mutator(move |_fd| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let socket = create_and_prepare_listener(&options, &addr("127.0.0.1:0")).unwrap();
    assert!(socket.port() > 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_mutator_aborts_preparation() {
    let options = BindOptions::new()
        .socket_mutator(|_fd| Err(std::io::Error::other("mutator rejected socket")));
    let err = create_and_prepare_listener(&options, &addr("127.0.0.1:0")).unwrap_err();
    assert!(matches!(err, ListenerError::Mutator { .. }));
    assert!(err.to_string().contains("mutator rejected socket"));
}

#[test]
fn wildcard_bind_produces_listeners_on_one_port() {
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let port = add_wildcard_addresses(&mut sockets, &BindOptions::new(), 0).unwrap();
    assert!(port > 0);
    assert!(!sockets.is_empty());
    for socket in &sockets {
        assert_eq!(socket.port(), port);
    }
}

#[test]
fn wildcard_bind_on_an_occupied_port_reports_both_failures() {
    let mut first: Vec<ListenerSocket> = Vec::new();
    let port = add_wildcard_addresses(&mut first, &BindOptions::new(), 0).unwrap();

    let mut second: Vec<ListenerSocket> = Vec::new();
    let err = add_wildcard_addresses(&mut second, &BindOptions::new(), port).unwrap_err();
    match &err {
        ListenerError::WildcardBind { v6_error, v4_error } => {
            assert!(!v6_error.is_empty());
            assert!(!v4_error.is_empty());
        }
        other => panic!("expected WildcardBind, got {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("[::]"));
    assert!(message.contains("0.0.0.0"));
    assert!(second.is_empty());
}

#[test]
fn system_enumeration_binds_local_interfaces_on_one_port() {
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let options = BindOptions::new().exclude_link_local(true);
    match add_all_local_addresses(&mut sockets, &options, 0) {
        Ok(port) => {
            assert!(port > 0);
            assert!(!sockets.is_empty());
            for socket in &sockets {
                assert_eq!(socket.port(), port);
            }
        }
        // A half-configured interface (e.g. a tentative IPv6
        // address) legitimately stops enumeration.
        Err(err) => assert!(matches!(err, ListenerError::AddListener { .. })),
    }
}

#[test]
fn enumeration_skips_duplicate_addresses() {
    // Bonded interfaces report one address twice; only one listener
    // may come out.
    let fake = FakeInterfaces::new(&[
        ("bond0", addr("127.0.0.1:0")),
        ("bond1", addr("127.0.0.1:0")),
    ]);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let port = add_all_local_addresses_with(&fake, &mut sockets, &BindOptions::new(), 0).unwrap();
    assert!(port > 0);
    assert_eq!(sockets.len(), 1);
    assert_eq!(sockets[0].port(), port);
}

#[test]
fn enumeration_excludes_link_local_when_asked() {
    let fake = FakeInterfaces::new(&[
        ("eth0", addr("169.254.10.1:0")),
        ("lo", addr("127.0.0.1:0")),
    ]);
    let options = BindOptions::new().exclude_link_local(true);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    add_all_local_addresses_with(&fake, &mut sockets, &options, 0).unwrap();
    assert_eq!(sockets.len(), 1);
    assert!(!sockets[0].addr().is_link_local());
}

#[test]
fn enumeration_skips_non_ip_families() {
    let fake = FakeInterfaces::new(&[
        ("ipc0", ResolvedAddress::abstract_unix("not-an-ip").unwrap()),
        ("lo", addr("127.0.0.1:0")),
    ]);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    add_all_local_addresses_with(&fake, &mut sockets, &BindOptions::new(), 0).unwrap();
    assert_eq!(sockets.len(), 1);
    assert_eq!(sockets[0].addr().family(), Family::Ipv4);
}

#[test]
fn enumeration_with_no_usable_addresses_fails() {
    let fake = FakeInterfaces::new(&[]);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let err =
        add_all_local_addresses_with(&fake, &mut sockets, &BindOptions::new(), 0).unwrap_err();
    assert!(matches!(err, ListenerError::NoAddresses));
    assert!(sockets.is_empty());
}

#[test]
fn enumeration_stops_on_first_failure_and_keeps_prior_listeners() {
    // 192.0.2/24 is reserved for documentation; no interface
    // carries it, so the second bind must fail.
    let fake = FakeInterfaces::new(&[
        ("lo", addr("127.0.0.1:0")),
        ("phantom0", addr("192.0.2.1:0")),
    ]);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let err =
        add_all_local_addresses_with(&fake, &mut sockets, &BindOptions::new(), 0).unwrap_err();
    match &err {
        ListenerError::AddListener { addr, .. } => assert!(addr.contains("192.0.2.1")),
        other => panic!("expected AddListener, got {other}"),
    }
    assert_eq!(sockets.len(), 1);
}

#[test]
fn missing_enumeration_capability_is_fatal() {
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let err =
        add_all_local_addresses_with(&NoInterfaceSupport, &mut sockets, &BindOptions::new(), 0)
            .unwrap_err();
    assert!(matches!(err, ListenerError::Capability { .. }));
    assert!(err.to_string().contains("not supported"));
}

#[test]
fn wildcard_expansion_falls_back_without_enumeration() {
    let options = BindOptions::new().expand_wildcards(true);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let port =
        add_wildcard_addresses_with(&NoInterfaceSupport, &mut sockets, &options, 0).unwrap();
    assert!(port > 0);
    assert!(!sockets.is_empty());
}

#[test]
fn wildcard_expansion_binds_enumerated_addresses() {
    let fake = FakeInterfaces::new(&[("lo", addr("127.0.0.1:0"))]);
    let options = BindOptions::new().expand_wildcards(true);
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let port = add_wildcard_addresses_with(&fake, &mut sockets, &options, 0).unwrap();
    assert!(port > 0);
    assert_eq!(sockets.len(), 1);
    assert_eq!(sockets[0].addr().to_string(), format!("127.0.0.1:{port}"));
}

#[test]
fn traffic_class_and_user_timeout_apply() {
    let options = BindOptions::new()
        .dscp(10)
        .tcp_user_timeout(std::time::Duration::from_secs(30));
    let socket = create_and_prepare_listener(&options, &addr("127.0.0.1:0")).unwrap();
    assert!(socket.port() > 0);
}

#[cfg(target_os = "linux")]
#[test]
fn abstract_unix_listener_reports_listening_state() {
    let name = format!("bindlane-test-{}", std::process::id());
    let target = ResolvedAddress::abstract_unix(name.as_bytes()).unwrap();
    let socket = create_and_prepare_listener(&BindOptions::new(), &target).unwrap();
    assert_eq!(socket.dsmode(), DsMode::None);
    assert_eq!(socket.port(), 1);
    assert!(socket.addr().to_string().starts_with('@'));
}

#[test]
fn wildcard_falls_back_to_v4_when_v6_is_taken() {
    // Park a listener on the v6 loopback; the v6 wildcard at that
    // port then collides while the v4 wildcard stays free.
    let Ok(parked) = create_and_prepare_listener(&BindOptions::new(), &addr("[::1]:0")) else {
        return; // no IPv6 stack to occupy
    };
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let port = add_wildcard_addresses(&mut sockets, &BindOptions::new(), parked.port()).unwrap();
    assert_eq!(port, parked.port());
    assert_eq!(sockets.len(), 1);
    assert_eq!(sockets[0].dsmode(), DsMode::Ipv4);
    assert_eq!(sockets[0].addr().family(), Family::Ipv4);
}

#[test]
fn container_find_matches_appended_addresses() {
    let mut sockets: Vec<ListenerSocket> = Vec::new();
    let socket = create_and_prepare_listener(&BindOptions::new(), &addr("127.0.0.1:0")).unwrap();
    ListenerSockets::append(&mut sockets, socket);
    // Lookup is by the address a listener was requested with.
    assert!(sockets.find(&addr("127.0.0.1:0")));
    assert!(!sockets.find(&addr("127.0.0.2:0")));
}
