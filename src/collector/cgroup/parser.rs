//! Parsers for cgroup control file contents.

use crate::collector::ParseError;

/// Parses a single-integer control file such as `cpu.cfs_quota_us`.
///
/// Returns `None` for empty or malformed content.
pub fn parse_i64_param(content: &str) -> Option<i64> {
    content.trim().parse().ok()
}

/// Parses a v2 `cpu.max` file into (quota_us, period_us).
///
/// Format: "quota period" or "max period"
/// Example: "100000 100000" or "max 100000"
pub fn parse_cpu_max(content: &str) -> (i64, i64) {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 2 {
        return (-1, 100_000);
    }

    let quota = if parts[0] == "max" {
        -1
    } else {
        parts[0].parse().unwrap_or(-1)
    };

    let period = parts[1].parse().unwrap_or(100_000);

    (quota, period)
}

/// Parses `cpuacct.usage_all` into (cpu, user_ns, system_ns) triples.
///
/// Format: header `cpu user system`, then one `N u_ns s_ns` line per CPU.
pub fn parse_usage_all(content: &str) -> Result<Vec<(usize, u64, u64)>, ParseError> {
    let mut lines = content.lines();

    let header = lines.next().ok_or_else(|| ParseError::new("empty usage_all"))?;
    if !header.starts_with("cpu") {
        return Err(ParseError::new(format!(
            "unexpected usage_all header: {:?}",
            header
        )));
    }

    let mut out = Vec::new();
    for line in lines {
        let mut parts = line.split_whitespace();
        let (Some(cpu), Some(user), Some(system)) = (parts.next(), parts.next(), parts.next())
        else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ParseError::new(format!("short usage_all line: {:?}", line)));
        };

        let cpu: usize = cpu
            .parse()
            .map_err(|_| ParseError::new(format!("bad cpu index: {:?}", cpu)))?;
        let user: u64 = user.parse().unwrap_or(0);
        let system: u64 = system.parse().unwrap_or(0);
        out.push((cpu, user, system));
    }

    Ok(out)
}

/// Parses `cpuacct.usage_percpu`: whitespace-separated per-CPU totals in
/// nanoseconds, in CPU order.
pub fn parse_usage_percpu(content: &str) -> Vec<u64> {
    content
        .split_whitespace()
        .map(|v| v.parse().unwrap_or(0))
        .collect()
}

/// Converts nanoseconds of CPU time to kernel ticks at the given rate.
pub fn ns_to_ticks(ns: u64, tick_rate: i64) -> u64 {
    ((ns as u128 * tick_rate as u128) / 1_000_000_000) as u64
}
