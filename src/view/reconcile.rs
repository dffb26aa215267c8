//! Reconciliation of host and cgroup CPU counters into the virtualized
//! per-CPU time series.
//!
//! Each read computes per-CPU deltas since the previous read, enforces a
//! per-visible-CPU ceiling derived from the sample's total energy, credits
//! donor-CPU surplus into visible CPUs, applies the partial-CPU idle
//! correction, and folds the result into the node's accumulators.

use tracing::debug;

use crate::collector::procfs::HostCpuLine;
use crate::cpuset::CpuSet;
use crate::model::CpuUsage;
use crate::view::registry::NodeState;

/// Aggregates handed to the renderer after a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Sums over the visible CPUs' view accumulators.
    pub user_sum: u64,
    pub system_sum: u64,
    pub idle_sum: u64,
    /// View values of the visible CPUs, in virtual-label order.
    pub per_cpu: Vec<CpuUsage>,
}

/// Step 1: marks online the sample entries whose host CPU appears in the
/// table and in the cpuset, and imputes their idle time as host idle plus
/// the host busy time the cgroup did not consume.
///
/// Returns `cpu_cnt`, the number of online in-cpuset CPUs seen.
pub fn impute_idle(host: &[HostCpuLine], samples: &mut [CpuUsage], cpuset: &CpuSet) -> u32 {
    let mut cpu_cnt = 0;

    // CPUs absent from this host table are offline, including ones a
    // reused sample buffer saw online last time.
    for slot in samples.iter_mut() {
        slot.online = false;
    }

    for line in host {
        let Some(slot) = samples.get_mut(line.index as usize) else {
            debug!(
                cpu = line.index,
                sample_len = samples.len(),
                "host CPU has no cgroup accounting entry, skipping"
            );
            continue;
        };

        if !cpuset.contains(line.index) {
            slot.online = false;
            continue;
        }

        let host_busy = line.busy_sum();
        let cg_busy = slot.busy();
        slot.idle = if host_busy < cg_busy {
            // The two counters are sampled at different instants; the
            // cgroup can appear busier than its host CPU.
            debug!(
                cpu = line.index,
                host_busy, cg_busy, "cgroup time exceeds host time, using raw host idle"
            );
            line.idle
        } else {
            line.idle + (host_busy - cg_busy)
        };
        slot.online = true;
        cpu_cnt += 1;
    }

    cpu_cnt
}

/// Moves surplus ticks into one field of a visible CPU, bounded by the
/// CPU's remaining headroom below `threshold` and by its idle delta
/// (credited busy time is paid for out of idle).
fn credit_surplus(surplus: &mut u64, usage: &mut CpuUsage, to_user: bool, threshold: u64) {
    let mut free_space = threshold.saturating_sub(usage.busy());
    if free_space > usage.idle {
        free_space = usage.idle;
    }

    let to_add = free_space.min(*surplus);
    if to_user {
        usage.user += to_add;
    } else {
        usage.system += to_add;
    }
    usage.idle -= to_add;
    *surplus -= to_add;
}

/// Steps 2-8: folds an annotated sample into the node state and returns
/// the aggregates to render.
///
/// `samples` must already be annotated by [`impute_idle`], and
/// `state.cpu_count()` must be at least `samples.len()`.
pub fn reconcile(
    state: &mut NodeState,
    samples: &[CpuUsage],
    cpu_cnt: u32,
    mut max_cpus: u32,
    exact_cpus: f64,
) -> Reconciled {
    let n = samples.len();

    // Fewer CPUs actually present than the policy allows.
    if max_cpus > cpu_cnt {
        max_cpus = cpu_cnt;
    }

    // A regressed counter on the first online CPU means the cgroup was
    // recreated; rebase so this read shows the new incarnation's time.
    for (i, sample) in samples.iter().enumerate() {
        if !sample.online {
            continue;
        }
        if sample.user < state.usage[i].user {
            debug!(cpu = i, "cgroup counters regressed, resetting node");
            state.rebase(samples);
        }
        break;
    }

    let mut diff = vec![CpuUsage::default(); n];
    let mut total_sum: u64 = 0;
    for i in 0..n {
        state.usage[i].online = samples[i].online;
        if !samples[i].online {
            continue;
        }
        diff[i] = samples[i].saturating_delta(&state.usage[i]);
        total_sum += diff[i].total();
        state.usage[i].accumulate(&diff[i]);
    }
    // Host CPUs beyond the sample range are gone from the table.
    for slot in state.usage.iter_mut().skip(n) {
        slot.online = false;
    }

    let mut user_sum: u64 = 0;
    let mut system_sum: u64 = 0;
    let mut idle_sum: u64 = 0;
    let mut per_cpu = Vec::new();

    if max_cpus > 0 {
        // The first max_cpus online CPUs are visible; the rest donate
        // their busy deltas to the surplus pools.
        let mut visible = Vec::with_capacity(max_cpus as usize);
        let mut user_surplus: u64 = 0;
        let mut system_surplus: u64 = 0;
        for i in 0..n {
            if !samples[i].online {
                continue;
            }
            if (visible.len() as u32) < max_cpus {
                visible.push(i);
            } else {
                user_surplus += diff[i].user;
                system_surplus += diff[i].system;
            }
        }

        let threshold = if cpu_cnt > 0 {
            total_sum / u64::from(cpu_cnt) * u64::from(max_cpus)
        } else {
            0
        };

        for &i in &visible {
            if diff[i].busy() >= threshold {
                continue;
            }
            credit_surplus(&mut user_surplus, &mut diff[i], true, threshold);
            if diff[i].busy() >= threshold {
                continue;
            }
            credit_surplus(&mut system_surplus, &mut diff[i], false, threshold);
        }
        if user_surplus > 0 {
            debug!(user_surplus, "leftover user surplus discarded");
        }
        if system_surplus > 0 {
            debug!(system_surplus, "leftover system surplus discarded");
        }

        for &i in &visible {
            state.view[i].accumulate(&diff[i]);
            user_sum += state.view[i].user;
            system_sum += state.view[i].system;
            idle_sum += state.view[i].idle;
        }

        // A fractional quota entitles the cgroup to less time than its
        // visible CPUs accumulated; take the excess out of idle, on the
        // aggregate and on the single visible CPU with the largest idle
        // delta. exact_cpus of 0 means no quota at all, not zero
        // entitlement.
        if exact_cpus > 0.0 && exact_cpus < f64::from(max_cpus) && !visible.is_empty() {
            let visible_total: u64 = visible.iter().map(|&i| diff[i].total()).sum();
            let delta =
                (visible_total as f64 * (1.0 - exact_cpus / f64::from(max_cpus))) as u64;
            idle_sum = idle_sum.saturating_sub(delta);

            let mut k = visible[0];
            for &i in &visible[1..] {
                if diff[i].idle > diff[k].idle {
                    k = i;
                }
            }
            state.view[k].idle = state.view[k].idle.saturating_sub(delta);
        }

        per_cpu.extend(visible.iter().map(|&i| state.view[i]));
    } else {
        // No quota: the view mirrors the reconciled usage directly.
        for i in 0..n {
            if !samples[i].online {
                continue;
            }
            state.view[i] = state.usage[i];
            user_sum += state.view[i].user;
            system_sum += state.view[i].system;
            idle_sum += state.view[i].idle;
            per_cpu.push(state.view[i]);
        }
    }

    Reconciled {
        user_sum,
        system_sum,
        idle_sum,
        per_cpu,
    }
}
