//! Thread placement for stage threads.
//!
//! Busy-spin stages only pay off when each one owns a core, so the ring buffer
//! can pin stage threads to the CPUs listed in its configuration.

use crate::error::{ Result, RingError };

/// Check that every CPU id names a logical CPU on this machine
pub fn validate_cpu_ids(cpu_ids: &[usize]) -> Result<()> {
    let available = num_cpus::get();
    match cpu_ids.iter().find(|&&id| id >= available) {
        Some(id) =>
            Err(
                RingError::config(
                    format!("CPU id {} out of range, {} logical CPUs available", id, available)
                )
            ),
        None => Ok(()),
    }
}

/// Pin the calling thread to `cpu_id`
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    use nix::sched::{ sched_setaffinity, CpuSet };
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set.set(cpu_id)?;
    sched_setaffinity(Pid::from_raw(0), &cpu_set)?;
    Ok(())
}

/// Pin the calling thread to `cpu_id`
#[cfg(target_os = "macos")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    use libc::{ pthread_self, thread_affinity_policy_data_t, thread_policy_set };
    use libc::{ THREAD_AFFINITY_POLICY, mach_port_t };

    unsafe {
        let mut policy = thread_affinity_policy_data_t {
            affinity_tag: cpu_id as i32,
        };

        let result = thread_policy_set(
            pthread_self() as mach_port_t,
            THREAD_AFFINITY_POLICY as u32,
            &mut policy as *mut _ as *mut i32,
            1
        );

        if result != 0 {
            return Err(RingError::system_resource("Failed to set CPU affinity"));
        }
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn pin_to_cpu(_cpu_id: usize) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cpu_ids() {
        assert!(validate_cpu_ids(&[]).is_ok());
        assert!(validate_cpu_ids(&[0]).is_ok());
        assert!(validate_cpu_ids(&[num_cpus::get()]).is_err());
    }

    #[test]
    fn test_out_of_range_is_config_error() {
        let err = validate_cpu_ids(&[0, usize::MAX]).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
