pub mod paths;

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use tracing::debug;

/// Address used when no route can be determined.
const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Well-known public address used only to let the kernel pick an outbound route.
/// Nothing is ever sent.
const ROUTE_PROBE: &str = "8.8.8.8:53";

/// Returns the address of this host's primary outbound interface.
///
/// Connecting a UDP socket performs route selection without sending packets,
/// so this works offline as long as a default route exists. Falls back to
/// `127.0.0.1`.
pub fn host_ip() -> IpAddr {
  match probe_route() {
    Some(ip) => ip,
    None => {
      debug!("no outbound route found, using loopback address");
      LOOPBACK
    }
  }
}

fn probe_route() -> Option<IpAddr> {
  let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
  socket.connect(ROUTE_PROBE).ok()?;
  let ip = socket.local_addr().ok()?.ip();
  if ip.is_unspecified() { None } else { Some(ip) }
}
