//! 에이전트 외부 방향 IP 탐지.
//!
//! 서버 주소로 UDP "connect"만 해서 커널이 고른 출발 주소를 읽는다.
//! 패킷은 보내지 않는다.

use std::net::{IpAddr, UdpSocket};
use tracing::debug;

/// 서버 주소(`host:port` 또는 URL)로 향하는 로컬 IP
pub fn outbound_ip(address: &str) -> Option<IpAddr> {
    let target = host_port(address);
    let bind_addr = if target.starts_with('[') {
        "[::]:0"
    } else {
        "0.0.0.0:0"
    };

    let socket = UdpSocket::bind(bind_addr).ok()?;
    if let Err(e) = socket.connect(target) {
        debug!("로컬 IP 탐지 실패: {target}: {e}");
        return None;
    }
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// 스킴/경로를 떼어낸 `host:port`
fn host_port(address: &str) -> &str {
    let without_scheme = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}
