//! Rendering of the virtualized host stat table.

use std::fmt::Write;

use tracing::warn;

use crate::view::CpuViewError;
use crate::view::reconcile::Reconciled;

/// Renders the virtualized block followed by the host remainder.
///
/// The aggregate and per-CPU lines carry only user/system/idle; the other
/// columns are forced to zero. Virtual CPU labels are contiguous from 0
/// regardless of which host CPUs back them. Output longer than `out_cap`
/// is a hard failure.
pub fn render_proc_stat(
    r: &Reconciled,
    remainder: &str,
    out_cap: usize,
) -> Result<String, CpuViewError> {
    let mut out = String::with_capacity(remainder.len() + 64 * (r.per_cpu.len() + 1));

    let _ = writeln!(
        out,
        "cpu  {} 0 {} {} 0 0 0 0 0 0",
        r.user_sum, r.system_sum, r.idle_sum
    );
    for (label, cpu) in r.per_cpu.iter().enumerate() {
        let _ = writeln!(
            out,
            "cpu{} {} 0 {} {} 0 0 0 0 0 0",
            label, cpu.user, cpu.system, cpu.idle
        );
    }
    out.push_str(remainder);

    if out.len() > out_cap {
        warn!(needed = out.len(), cap = out_cap, "proc_stat output exceeds buffer");
        return Err(CpuViewError::Capacity {
            needed: out.len(),
            cap: out_cap,
        });
    }

    Ok(out)
}
