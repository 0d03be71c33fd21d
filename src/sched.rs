//! CPU pinning for the bit-bang loop.
//!
//! A clock pulse stretched by a reschedule to another core corrupts the
//! sample without any error, so the reading thread is pinned to one core
//! before any GPIO I/O happens.

use log::{info, warn};

use crate::error::{Error, Result};

/// Pin the calling thread to `cpu`.
///
/// Platforms that cannot report their cores get a warning and carry on
/// unpinned.
pub fn pin_to_cpu(cpu: usize) -> Result<()> {
    let Some(cores) = core_affinity::get_core_ids() else {
        warn!("CPU affinity not supported here, running unpinned");
        return Ok(());
    };
    let core = cores
        .into_iter()
        .find(|core| core.id == cpu)
        .ok_or(Error::Scheduling { cpu })?;
    if !core_affinity::set_for_current(core) {
        return Err(Error::Scheduling { cpu });
    }
    info!("pinned to CPU {}", cpu);
    Ok(())
}
