use sysinfo::System;

use crate::shutdown::HelperThread;

/// Local CPU usage, in percent of all cores, above which the load generator is likely limited by
/// this machine rather than by the resolver.
const HIGH_CPU_USAGE: f32 = 90.0;

/// Monitor the CPU usage of this machine while the load runs and report high usage.
///
/// Note that this won't stop the run, it will just log a warning to let the user know that the
/// measured throughput might be limited by the load generator host.
///
/// The usage is collected every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and checked.
pub(crate) fn start_monitor() -> Option<HelperThread> {
    HelperThread::spawn("monitor", |listener| {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        let cpu_count = sys.cpus().len();

        while !listener.wait(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL) {
            sys.refresh_cpu_usage();

            let usage = sys.global_cpu_usage();
            if usage > HIGH_CPU_USAGE {
                log::warn!(
                    "High CPU usage detected on the load generator. It is using {usage:.2}% of the CPU, with {cpu_count} available cores"
                );
            }
        }
    })
}
