//! Reverse name resolution: DNS PTR first, NetBIOS on Windows

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

pub const DEFAULT_HOSTNAME_TIMEOUT: Duration = Duration::from_millis(2000);

/// Resolver calls allowed on blocking threads at once
const MAX_BLOCKING_LOOKUPS: usize = 64;

static LOOKUP_SLOTS: LazyLock<Semaphore> = LazyLock::new(|| Semaphore::new(MAX_BLOCKING_LOOKUPS));

/// Resolve a display name for `ip`. Absence of a name is not an error.
///
/// The resolver calls block, so a timeout only stops the wait: the thread keeps going until the
/// OS gives up and holds its lookup slot until then. With every slot taken, lookups return
/// `None` once `wait` runs out rather than piling up more threads.
pub async fn resolve_hostname(ip: Ipv4Addr, wait: Duration) -> Option<String> {
    bounded_lookup(&LOOKUP_SLOTS, wait, move || {
        if let Some(name) = reverse_dns(ip) {
            return Some(name);
        }

        #[cfg(target_os = "windows")]
        if let Some(name) = netbios_name(ip) {
            return Some(name);
        }

        None
    })
    .await
}

async fn bounded_lookup<F>(slots: &'static Semaphore, wait: Duration, lookup: F) -> Option<String>
where
    F: FnOnce() -> Option<String> + Send + 'static,
{
    let attempt = async move {
        let permit = slots.acquire().await.ok()?;
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            lookup()
        });
        match task.await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!("hostname lookup panicked: {}", e);
                None
            }
        }
    };

    timeout(wait, attempt).await.unwrap_or(None)
}

fn reverse_dns(ip: Ipv4Addr) -> Option<String> {
    let name = dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok()?;
    let name = name.trim().trim_end_matches('.');

    // getnameinfo echoes the numeric address back when there is no PTR record
    if name.is_empty() || name.parse::<IpAddr>().is_ok() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(target_os = "windows")]
fn netbios_name(ip: Ipv4Addr) -> Option<String> {
    let output = super::hidden_command_sync("nbtstat")
        .args(["-A", &ip.to_string()])
        .output()
        .ok()?;
    parse_nbtstat_name(&String::from_utf8_lossy(&output.stdout))
}

/// Workstation name from `nbtstat -A` output: the `<00>` record flagged `UNIQUE`.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn parse_nbtstat_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.contains("<00>") && line.contains("UNIQUE"))
        .filter_map(|line| line.split('<').next())
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}
