//! Liveness probes: system ping, plus a TCP connect fallback for ICMP-filtered networks

use super::hidden_command_sync;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Outcome of a liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub alive: bool,
    pub response_time_ms: Option<f64>,
}

impl PingResult {
    pub fn dead() -> Self {
        Self::default()
    }

    pub fn alive(response_time_ms: f64) -> Self {
        Self {
            alive: true,
            response_time_ms: Some(response_time_ms),
        }
    }
}

/// How the host discovery unit decides a host is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum LivenessStrategy {
    /// One ICMP echo through the system ping command
    #[default]
    Icmp,
    /// TCP connect to a fixed port; for networks that drop ICMP
    Tcp { port: u16 },
}

/// Send a single echo request to `ip` and wait up to `wait` for the reply.
///
/// Never fails: spawn errors, permission problems and timeouts all come back as dead.
pub async fn ping_host(ip: Ipv4Addr, wait: Duration) -> PingResult {
    let ip_str = ip.to_string();

    let result = tokio::task::spawn_blocking(move || {
        let start = Instant::now();

        #[cfg(target_os = "windows")]
        let output = hidden_command_sync("ping")
            .args(["-n", "1", "-w", &wait.as_millis().to_string(), &ip_str])
            .output();

        #[cfg(not(target_os = "windows"))]
        let output = hidden_command_sync("ping")
            .args(["-c", "1", "-W", &wait_secs(wait).to_string(), &ip_str])
            .output();

        match output {
            Ok(output) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                let output_str = String::from_utf8_lossy(&output.stdout);

                // Windows ping exits 0 on "destination unreachable"; only a TTL line is a reply
                #[cfg(target_os = "windows")]
                if !output_str.to_uppercase().contains("TTL=") {
                    return PingResult::dead();
                }

                #[cfg(not(target_os = "windows"))]
                if !output.status.success() {
                    return PingResult::dead();
                }

                PingResult::alive(parse_ping_time(&output_str).unwrap_or(elapsed_ms))
            }
            Err(e) => {
                tracing::debug!("ping {} could not run: {}", ip_str, e);
                PingResult::dead()
            }
        }
    })
    .await;

    result.unwrap_or_default()
}

/// TCP connect liveness check: a completed handshake on `port` means the host is up.
pub async fn check_tcp_alive(ip: Ipv4Addr, port: u16, wait: Duration) -> PingResult {
    let start = Instant::now();
    let addr = SocketAddr::new(IpAddr::V4(ip), port);

    match tokio::time::timeout(wait, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => PingResult::alive(start.elapsed().as_secs_f64() * 1000.0),
        _ => PingResult::dead(),
    }
}

/// Probe liveness with the configured strategy
pub async fn probe_liveness(ip: Ipv4Addr, strategy: LivenessStrategy, wait: Duration) -> PingResult {
    match strategy {
        LivenessStrategy::Icmp => ping_host(ip, wait).await,
        LivenessStrategy::Tcp { port } => check_tcp_alive(ip, port, wait).await,
    }
}

/// `-W` on unix ping takes whole seconds
#[cfg_attr(target_os = "windows", allow(dead_code))]
fn wait_secs(wait: Duration) -> u64 {
    wait.as_millis().div_ceil(1000).max(1) as u64
}

/// Parse ping response time from command output
fn parse_ping_time(output: &str) -> Option<f64> {
    for word in output.split_whitespace() {
        if word.starts_with("time=") || word.starts_with("time<") {
            let time_str = word
                .trim_start_matches("time=")
                .trim_start_matches("time<")
                .trim_end_matches("ms");

            if let Ok(time) = time_str.parse::<f64>() {
                return Some(time);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_ping_time_unix() {
        let out = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.412 ms";
        assert_eq!(parse_ping_time(out), Some(0.412));
    }

    #[test]
    fn test_parse_ping_time_windows() {
        let out = "Reply from 10.0.0.1: bytes=32 time<1ms TTL=128";
        assert_eq!(parse_ping_time(out), Some(1.0));
        let out = "Reply from 10.0.0.1: bytes=32 time=14ms TTL=128";
        assert_eq!(parse_ping_time(out), Some(14.0));
    }

    #[test]
    fn test_parse_ping_time_missing() {
        assert_eq!(parse_ping_time("Request timed out."), None);
    }

    #[test]
    fn test_wait_secs_rounds_up() {
        assert_eq!(wait_secs(Duration::from_millis(2000)), 2);
        assert_eq!(wait_secs(Duration::from_millis(2500)), 3);
        assert_eq!(wait_secs(Duration::from_millis(10)), 1);
    }

    #[tokio::test]
    async fn test_tcp_alive_on_listening_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = probe_liveness(
            Ipv4Addr::LOCALHOST,
            LivenessStrategy::Tcp { port },
            Duration::from_secs(1),
        )
        .await;
        assert!(result.alive);
        assert!(result.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_tcp_dead_on_closed_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = check_tcp_alive(Ipv4Addr::LOCALHOST, port, Duration::from_secs(1)).await;
        assert_eq!(result, PingResult::dead());
    }

    #[test]
    fn test_strategy_deserializes() {
        let s: LivenessStrategy = serde_json::from_str(r#"{"mode":"tcp","port":22}"#).unwrap();
        assert_eq!(s, LivenessStrategy::Tcp { port: 22 });
        let s: LivenessStrategy = serde_json::from_str(r#"{"mode":"icmp"}"#).unwrap();
        assert_eq!(s, LivenessStrategy::Icmp);
    }
}
