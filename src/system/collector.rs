use color_eyre::Result;
use color_eyre::eyre::eyre;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::ps::ResidentReading;
use super::sampler::{ProbeMarkers, ProcessProbe};

/// Reads the harness's own RSS and task list through sysinfo.
pub struct SysinfoProbe {
    sys: System,
    pid: Pid,
}

impl SysinfoProbe {
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| eyre!("cannot resolve own pid: {e}"))?;
        Ok(SysinfoProbe {
            sys: System::new(),
            pid,
        })
    }

    fn refresh(&mut self) {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_tasks(),
        );
    }
}

impl ProcessProbe for SysinfoProbe {
    fn resident(&mut self) -> Result<ResidentReading> {
        self.refresh();
        let process = self
            .sys
            .process(self.pid)
            .ok_or_else(|| eyre!("pid {} missing from process table", self.pid))?;
        Ok(ResidentReading {
            bad_lines: 0,
            rss_kib: Some((process.memory() / 1024).to_string()),
        })
    }

    fn threads(&mut self) -> Result<usize> {
        self.refresh();
        let process = self
            .sys
            .process(self.pid)
            .ok_or_else(|| eyre!("pid {} missing from process table", self.pid))?;
        // the task list leaves out the main thread
        process
            .tasks()
            .map(|tasks| tasks.len() + 1)
            .ok_or_else(|| eyre!("task list not available on this platform"))
    }

    fn markers(&self) -> ProbeMarkers {
        ProbeMarkers::SYSINFO
    }
}
