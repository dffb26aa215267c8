//! Parser for the host per-CPU time table (`/proc/stat`).

use tracing::debug;

/// One `cpuN` line from the host table, in ticks.
///
/// Field order follows the kernel: user nice system idle iowait irq
/// softirq steal guest guest_nice. Kernels older than the full set render
/// fewer columns; missing columns read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCpuLine {
    pub index: u32,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl HostCpuLine {
    /// Everything the host spent on this CPU except idle.
    pub fn busy_sum(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
    }
}

/// The host table split into the per-CPU block and the passthrough tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStat<'a> {
    /// `cpuN` lines in file order. Indices may be non-contiguous.
    pub cpus: Vec<HostCpuLine>,
    /// Everything from the first non-`cpuN` line onward, verbatim.
    pub remainder: &'a str,
}

/// CPU labels are at most `cpu` + 10 decimal digits.
const CPU_LABEL_DIGITS: usize = 10;

/// Parses the leading `cpu`/`cpuN` block of a host stat table.
///
/// The aggregate `cpu ` line is consumed (the renderer emits its own);
/// `cpuN` lines are collected until the first line that is neither, which
/// starts the verbatim remainder. Unparseable `cpuN` labels are skipped.
pub fn parse_host_stat(content: &str) -> HostStat<'_> {
    let mut cpus = Vec::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else {
            // Blank line ends the CPU block.
            return HostStat {
                cpus,
                remainder: &content[line_start..],
            };
        };

        if label == "cpu" {
            continue;
        }

        let Some(digits) = label.strip_prefix("cpu") else {
            return HostStat {
                cpus,
                remainder: &content[line_start..],
            };
        };

        if digits.is_empty() || digits.len() > CPU_LABEL_DIGITS {
            return HostStat {
                cpus,
                remainder: &content[line_start..],
            };
        }

        let Ok(index) = digits.parse::<u32>() else {
            debug!(label, "skipping unparseable cpu label");
            continue;
        };

        let mut get_val = || -> u64 { parts.next().and_then(|s| s.parse().ok()).unwrap_or(0) };

        cpus.push(HostCpuLine {
            index,
            user: get_val(),
            nice: get_val(),
            system: get_val(),
            idle: get_val(),
            iowait: get_val(),
            irq: get_val(),
            softirq: get_val(),
            steal: get_val(),
            guest: get_val(),
            guest_nice: get_val(),
        });
    }

    HostStat {
        cpus,
        remainder: &content[content.len()..],
    }
}
