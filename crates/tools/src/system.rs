//! Sysinfo tool: host information for the model.
//!
//! Figures come from the `sysinfo` crate, which blocks while it samples, so
//! each report is gathered on the blocking pool.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use joi_core::error::ToolError;
use joi_core::tool::{Tool, ToolArgs};
use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::arg_string;

/// Processes listed in the `basic` report.
const TOP_PROCESSES: usize = 5;

pub struct SysinfoTool;

#[async_trait]
impl Tool for SysinfoTool {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn description(&self) -> &str {
        "Reports information about this computer. param \"basic\" (default) covers OS, uptime, CPU, memory, disks and top processes; \"network\" covers hostname, local addresses and interface traffic."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "sysinfo", "args": {"param": "basic"}}
TOOL_CALL::{"tool": "sysinfo", "args": {"param": "network"}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let raw = arg_string(args, "param").unwrap_or_else(|| "basic".into());
        match raw.trim().to_lowercase().as_str() {
            "basic" => blocking(basic_report).await,
            "network" => Ok(network_report().await),
            _ => Ok(format!(
                "Error: Invalid parameter '{raw}' for sysinfo. Use 'basic' or 'network'."
            )),
        }
    }
}

async fn blocking(report: fn() -> String) -> Result<String, ToolError> {
    tokio::task::spawn_blocking(report)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "sysinfo".into(),
            reason: e.to_string(),
        })
}

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into())
}

fn basic_report() -> String {
    let mut sys = System::new_all();
    // CPU usage is a delta between two samples.
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let os = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| std::env::consts::OS.to_string());
    let processor = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "unknown".into());

    let mut out = vec![
        "=== SYSTEM INFO ===".to_string(),
        format!("OS: {os} ({})", std::env::consts::ARCH),
        format!("Hostname: {}", host_name()),
        format!("Uptime: {}", format_uptime(System::uptime())),
        format!("Date/Time: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
        String::new(),
        "=== CPU INFO ===".to_string(),
        format!("Processor: {processor}"),
        format!("Logical CPUs: {}", sys.cpus().len()),
        format!("Usage: {:.1}%", sys.global_cpu_usage()),
        String::new(),
        "=== MEMORY INFO ===".to_string(),
        format!("Total: {}", format_bytes(sys.total_memory())),
        format!(
            "Used: {} ({})",
            format_bytes(sys.used_memory()),
            percent(sys.used_memory(), sys.total_memory())
        ),
        format!("Available: {}", format_bytes(sys.available_memory())),
        String::new(),
        "=== DISK INFO ===".to_string(),
    ];

    let disks = Disks::new_with_refreshed_list();
    let mut any_disk = false;
    for disk in disks.list().iter().filter(|d| d.total_space() > 0) {
        any_disk = true;
        let used = disk.total_space().saturating_sub(disk.available_space());
        out.push(format!(
            "Drive {} ({}): {} used of {} ({})",
            disk.mount_point().display(),
            disk.name().to_string_lossy(),
            format_bytes(used),
            format_bytes(disk.total_space()),
            percent(used, disk.total_space())
        ));
    }
    if !any_disk {
        out.push("No accessible disk partitions found.".into());
    }

    out.push(String::new());
    out.push("=== TOP PROCESSES (by memory) ===".into());
    let mut processes: Vec<_> = sys.processes().values().collect();
    processes.sort_by(|a, b| b.memory().cmp(&a.memory()));
    if processes.is_empty() {
        out.push("No process information available.".into());
    }
    for process in processes.into_iter().take(TOP_PROCESSES) {
        out.push(format!(
            "PID {}: {} - Memory: {}",
            process.pid(),
            process.name().to_string_lossy(),
            format_bytes(process.memory())
        ));
    }

    out.join("\n")
}

async fn network_report() -> String {
    let host = host_name();
    let mut out = vec![
        "=== NETWORK INFO ===".to_string(),
        format!("Hostname: {host}"),
        String::new(),
        "=== LOCAL ADDRESSES ===".to_string(),
    ];

    match tokio::net::lookup_host((host.as_str(), 0)).await {
        Ok(addrs) => {
            let ips: BTreeSet<IpAddr> = addrs.map(|a| a.ip()).collect();
            if ips.is_empty() {
                out.push("No addresses resolved for this host.".into());
            }
            for ip in ips {
                let family = if ip.is_ipv4() { "IPv4" } else { "IPv6" };
                out.push(format!("{family}: {ip}"));
            }
        }
        Err(e) => {
            debug!(host = %host, error = %e, "Hostname lookup failed");
            out.push(format!("Could not resolve local addresses: {e}"));
        }
    }

    out.push(String::new());
    out.push("=== INTERFACES ===".into());
    let interfaces = tokio::task::spawn_blocking(interface_lines)
        .await
        .unwrap_or_default();
    if interfaces.is_empty() {
        out.push("No network interfaces found.".into());
    }
    out.extend(interfaces);
    out.join("\n")
}

fn interface_lines() -> Vec<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut lines: Vec<String> = networks
        .iter()
        .map(|(name, data)| {
            format!(
                "{name}: received {}, sent {}",
                format_bytes(data.total_received()),
                format_bytes(data.total_transmitted())
            )
        })
        .collect();
    lines.sort();
    lines
}

/// `3d 4h 5m`, `2h 0m`, `42s` style.
pub fn format_uptime(total: u64) -> String {
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || days > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        parts.push(format!("{minutes}m"));
    }
    if parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// `512 B`, `1.5 KB`, `16.0 GB` style, binary multiples.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.0%".into();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}
