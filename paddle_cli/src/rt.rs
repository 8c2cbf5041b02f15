//! Real-time process setup: memory locking, SCHED_FIFO priority and CPU
//! affinity. Every step is best-effort; failures are logged and the loop runs
//! on the normal scheduler.

use std::sync::OnceLock;

use crate::cli::{RtArgs, RtLock};

static RT_ONCE: OnceLock<RtOutcome> = OnceLock::new();

/// What was actually applied; reported in the run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtOutcome {
    pub mem_locked: bool,
    pub fifo_prio: Option<i32>,
    pub cpu: Option<usize>,
}

/// Apply the requested settings once per process.
pub fn setup_rt_once(args: &RtArgs) -> RtOutcome {
    if !args.rt {
        return RtOutcome::default();
    }
    *RT_ONCE.get_or_init(|| {
        let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
        let outcome = RtOutcome {
            mem_locked: report("mlockall", lock_memory(lock)),
            fifo_prio: report_value("SCHED_FIFO", fifo_priority(args.rt_prio)),
            cpu: report_value("affinity", pin_cpu(args.rt_cpu.unwrap_or(0))),
        };
        tracing::info!(?lock, ?outcome, "real-time setup");
        outcome
    })
}

fn report(what: &str, res: eyre::Result<bool>) -> bool {
    res.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "{what} not applied");
        false
    })
}

fn report_value<T>(what: &str, res: eyre::Result<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(error = %err, "{what} not applied");
            None
        }
    }
}

#[cfg(unix)]
fn lock_memory(lock: RtLock) -> eyre::Result<bool> {
    let flags = match lock {
        RtLock::None => return Ok(false),
        RtLock::Current => libc::MCL_CURRENT,
        RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
    };
    // SAFETY: mlockall takes flags only and touches no Rust-managed memory.
    if unsafe { libc::mlockall(flags) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    if lock == RtLock::All && retryable {
        // SAFETY: as above.
        if unsafe { libc::mlockall(libc::MCL_CURRENT) } == 0 {
            tracing::warn!(error = %err, "mlockall(current|future) failed; locked current pages only");
            return Ok(true);
        }
    }
    let mut msg = format!("mlockall failed: {err}");
    if retryable {
        if let Some(limit) = memlock_limit_kib() {
            msg.push_str(&format!("; memlock limit {limit} KiB"));
        }
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(not(unix))]
fn lock_memory(_lock: RtLock) -> eyre::Result<bool> {
    eyre::bail!("memory locking is not supported on this platform")
}

#[cfg(unix)]
fn memlock_limit_kib() -> Option<u64> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit fills the struct on success; it is only read then.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the struct was initialised.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    (cur != libc::RLIM_INFINITY).then_some(cur as u64 / 1024)
}

#[cfg(target_os = "linux")]
fn fifo_priority(wanted: Option<i32>) -> eyre::Result<i32> {
    // SAFETY: plain queries of the scheduler's priority range.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = wanted.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio,
    };
    // SAFETY: pid 0 is the calling process; `param` outlives the call.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        let err = std::io::Error::last_os_error();
        eyre::bail!("sched_setscheduler(prio={prio}): {err}; needs CAP_SYS_NICE or root");
    }
    Ok(prio)
}

#[cfg(not(target_os = "linux"))]
fn fifo_priority(_wanted: Option<i32>) -> eyre::Result<i32> {
    eyre::bail!("SCHED_FIFO is only available on Linux")
}

#[cfg(target_os = "linux")]
fn pin_cpu(cpu: usize) -> eyre::Result<usize> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; all-zero is the empty set.
    let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let size = std::mem::size_of::<libc::cpu_set_t>();
    // SAFETY: `allowed` is a valid, writable cpu_set_t of `size` bytes.
    if unsafe { libc::sched_getaffinity(0, size, &mut allowed) } != 0 {
        eyre::bail!("sched_getaffinity: {}", std::io::Error::last_os_error());
    }
    // SAFETY: cpu < capacity was checked above.
    if !unsafe { libc::CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by the current affinity mask");
    }
    // SAFETY: as above.
    let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe { libc::CPU_SET(cpu, &mut desired) };
    // SAFETY: `desired` is a valid cpu_set_t of `size` bytes.
    if unsafe { libc::sched_setaffinity(0, size, &desired) } != 0 {
        eyre::bail!("sched_setaffinity: {}", std::io::Error::last_os_error());
    }
    Ok(cpu)
}

#[cfg(not(target_os = "linux"))]
fn pin_cpu(_cpu: usize) -> eyre::Result<usize> {
    eyre::bail!("CPU affinity is only available on Linux")
}
