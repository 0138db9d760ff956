//! Real-time scheduling setup for the control loop (Linux only).
//!
//! SCHED_FIFO keeps step-generation latency bounded while a move is in
//! flight, and mlockall avoids page faults mid-motion. Both can fail
//! without privileges; failures are logged and the loop runs at normal
//! priority.

use std::sync::Once;

static RT_ONCE: Once = Once::new();

const RT_PRIORITY: i32 = 10;

pub fn setup_rt_once() {
    RT_ONCE.call_once(|| {
        unsafe {
            let param = libc::sched_param {
                sched_priority: RT_PRIORITY,
            };
            if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
                tracing::warn!(
                    errno = *libc::__errno_location(),
                    "SCHED_FIFO not applied; continuing at normal priority"
                );
            } else {
                tracing::info!(priority = RT_PRIORITY, "SCHED_FIFO applied");
            }

            if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
                tracing::warn!(
                    errno = *libc::__errno_location(),
                    "mlockall failed; memory stays pageable"
                );
            } else {
                tracing::info!("memory locked");
            }
        }
    });
}
