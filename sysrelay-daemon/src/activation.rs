//! Socket acquisition -- systemd socket activation with a bind fallback.
//!
//! systemd passes pre-opened sockets starting at fd 3 and announces them
//! through `LISTEN_PID` / `LISTEN_FDS`. Each descriptor is classified by
//! `SO_TYPE`: datagram sockets become UDP receivers, stream sockets become
//! TCP listeners, anything else is skipped.
//!
//! When activation yields nothing, the `[listen]` addresses are bound
//! directly. This is meant for development; production units should use
//! a `.socket` file.

use std::os::fd::{FromRawFd, RawFd};

use anyhow::Result;
use socket2::{Socket, Type};
use sysrelay_core::config::ListenConfig;
use sysrelay_core::error::IngestError;
use sysrelay_ingest::ListenerSet;

/// First descriptor passed by the service manager.
pub const LISTEN_FDS_START: RawFd = 3;

const ENV_LISTEN_PID: &str = "LISTEN_PID";
const ENV_LISTEN_FDS: &str = "LISTEN_FDS";
const ENV_LISTEN_FDNAMES: &str = "LISTEN_FDNAMES";

/// A socket inherited from the service manager.
#[derive(Debug)]
pub enum ActivatedSocket {
    /// `SOCK_DGRAM`
    Datagram(std::net::UdpSocket),
    /// `SOCK_STREAM` (already listening)
    Stream(std::net::TcpListener),
}

/// Number of activated descriptors meant for this process.
///
/// Returns 0 when the variables are missing, malformed, or addressed to
/// another PID.
pub fn activated_fd_count(listen_pid: Option<&str>, listen_fds: Option<&str>, pid: u32) -> usize {
    let (Some(listen_pid), Some(listen_fds)) = (listen_pid, listen_fds) else {
        return 0;
    };

    match listen_pid.trim().parse::<u32>() {
        Ok(target) if target == pid => {}
        Ok(target) => {
            tracing::debug!(target, pid, "LISTEN_PID addressed to another process");
            return 0;
        }
        Err(e) => {
            tracing::warn!(value = listen_pid, error = %e, "invalid LISTEN_PID, ignoring");
            return 0;
        }
    }

    match listen_fds.trim().parse::<usize>() {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(value = listen_fds, error = %e, "invalid LISTEN_FDS, ignoring");
            0
        }
    }
}

/// Classify an inherited socket by `SO_TYPE`.
///
/// Unsupported types are dropped (and therefore closed).
pub fn classify(socket: Socket) -> Option<ActivatedSocket> {
    match socket.r#type() {
        Ok(ty) if ty == Type::DGRAM => Some(ActivatedSocket::Datagram(socket.into())),
        Ok(ty) if ty == Type::STREAM => Some(ActivatedSocket::Stream(socket.into())),
        Ok(ty) => {
            tracing::warn!(socket_type = ?ty, "skipping activated socket of unsupported type");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to query SO_TYPE, skipping activated descriptor");
            None
        }
    }
}

/// Take ownership of the sockets passed by the service manager.
///
/// The activation variables are removed from the environment so that
/// child processes do not inherit them.
pub fn take_activated_sockets() -> Vec<ActivatedSocket> {
    let listen_pid = std::env::var(ENV_LISTEN_PID).ok();
    let listen_fds = std::env::var(ENV_LISTEN_FDS).ok();

    // SAFETY: called once during startup, before any task that reads the
    // environment is spawned.
    unsafe {
        std::env::remove_var(ENV_LISTEN_PID);
        std::env::remove_var(ENV_LISTEN_FDS);
        std::env::remove_var(ENV_LISTEN_FDNAMES);
    }

    let count = activated_fd_count(
        listen_pid.as_deref(),
        listen_fds.as_deref(),
        std::process::id(),
    );

    let mut sockets = Vec::with_capacity(count);
    for offset in 0..count {
        let Some(fd) = RawFd::try_from(offset)
            .ok()
            .and_then(|o| LISTEN_FDS_START.checked_add(o))
        else {
            tracing::warn!(offset, "activated descriptor number out of range");
            break;
        };

        // SAFETY: the service manager hands these descriptors to this PID
        // (checked above) and nothing else in the process owns them.
        let socket = unsafe { Socket::from_raw_fd(fd) };
        if let Some(activated) = classify(socket) {
            tracing::debug!(fd, kind = activated.kind(), "adopted activated socket");
            sockets.push(activated);
        }
    }

    if count > 0 {
        tracing::info!(passed = count, adopted = sockets.len(), "socket activation");
    }
    sockets
}

impl ActivatedSocket {
    /// `"udp"` or `"tcp"`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Datagram(_) => "udp",
            Self::Stream(_) => "tcp",
        }
    }
}

/// Register inherited std sockets with the tokio reactor.
///
/// Must run inside a tokio runtime.
pub fn into_listener_set(sockets: Vec<ActivatedSocket>) -> Result<ListenerSet, IngestError> {
    let mut set = ListenerSet::new();

    for socket in sockets {
        let kind = socket.kind();
        let to_socket_error = |e: std::io::Error| IngestError::Socket {
            kind: kind.to_owned(),
            reason: e.to_string(),
        };

        match socket {
            ActivatedSocket::Datagram(std_socket) => {
                std_socket.set_nonblocking(true).map_err(to_socket_error)?;
                let socket = tokio::net::UdpSocket::from_std(std_socket).map_err(to_socket_error)?;
                set = set.with_udp(socket);
            }
            ActivatedSocket::Stream(std_listener) => {
                std_listener.set_nonblocking(true).map_err(to_socket_error)?;
                let listener =
                    tokio::net::TcpListener::from_std(std_listener).map_err(to_socket_error)?;
                set = set.with_tcp(listener);
            }
        }
    }

    Ok(set)
}

/// Acquire the sockets the dispatcher will serve.
///
/// Order: activated sockets (if enabled) -> `[listen]` bind fallback.
/// No sockets at all is [`IngestError::NoSockets`].
pub async fn acquire_listeners(config: &ListenConfig) -> Result<ListenerSet, IngestError> {
    let mut set = if config.socket_activation {
        into_listener_set(take_activated_sockets())?
    } else {
        ListenerSet::new()
    };

    if set.is_empty() && (!config.udp.is_empty() || !config.tcp.is_empty()) {
        tracing::info!(
            udp = ?config.udp,
            tcp = ?config.tcp,
            "no activated sockets, binding [listen] addresses"
        );
        set = ListenerSet::bind(&config.udp, &config.tcp).await?;
    }

    if set.is_empty() {
        return Err(IngestError::NoSockets);
    }

    tracing::info!(
        udp = ?set.udp_addrs(),
        tcp = ?set.tcp_addrs(),
        "listeners acquired"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::Domain;

    #[test]
    fn fd_count_requires_both_variables() {
        assert_eq!(activated_fd_count(None, Some("2"), 42), 0);
        assert_eq!(activated_fd_count(Some("42"), None, 42), 0);
        assert_eq!(activated_fd_count(None, None, 42), 0);
    }

    #[test]
    fn fd_count_checks_pid() {
        assert_eq!(activated_fd_count(Some("42"), Some("2"), 42), 2);
        assert_eq!(activated_fd_count(Some("43"), Some("2"), 42), 0);
    }

    #[test]
    fn fd_count_ignores_garbage() {
        assert_eq!(activated_fd_count(Some("abc"), Some("2"), 42), 0);
        assert_eq!(activated_fd_count(Some("42"), Some("-1"), 42), 0);
        assert_eq!(activated_fd_count(Some(" 42 "), Some(" 1 "), 42), 1);
    }

    #[test]
    fn classify_datagram_socket() {
        let std_socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let activated = classify(Socket::from(std_socket)).unwrap();
        assert!(matches!(activated, ActivatedSocket::Datagram(_)));
        assert_eq!(activated.kind(), "udp");
    }

    #[test]
    fn classify_stream_socket() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let activated = classify(Socket::from(std_listener)).unwrap();
        assert!(matches!(activated, ActivatedSocket::Stream(_)));
        assert_eq!(activated.kind(), "tcp");
    }

    #[test]
    fn classify_skips_other_types() {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None).unwrap();
        assert!(classify(socket).is_none());
    }

    #[tokio::test]
    async fn converts_to_tokio_sockets() {
        let udp = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let tcp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let udp_addr = udp.local_addr().unwrap();

        let set = into_listener_set(vec![
            ActivatedSocket::Datagram(udp),
            ActivatedSocket::Stream(tcp),
        ])
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.udp_addrs(), vec![udp_addr]);
    }

    #[tokio::test]
    async fn fallback_binds_configured_addresses() {
        let config = ListenConfig {
            socket_activation: false,
            udp: vec!["127.0.0.1:0".to_owned()],
            tcp: vec!["127.0.0.1:0".to_owned()],
        };
        let set = acquire_listeners(&config).await.unwrap();
        assert_eq!(set.udp_addrs().len(), 1);
        assert_eq!(set.tcp_addrs().len(), 1);
    }

    #[tokio::test]
    async fn nothing_to_serve_is_fatal() {
        let config = ListenConfig {
            socket_activation: false,
            udp: Vec::new(),
            tcp: Vec::new(),
        };
        let err = acquire_listeners(&config).await.unwrap_err();
        assert!(matches!(err, IngestError::NoSockets));
    }
}
