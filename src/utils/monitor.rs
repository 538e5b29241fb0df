use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use std::sync::Arc;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Extract => "Extract",
            Phase::Transform => "Transform",
            Phase::Load => "Load",
        };
        f.write_str(name)
    }
}

/// 單一階段處理的筆數與耗時（extract 為信件數，其後為紀錄數）
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub items: usize,
    pub elapsed: Duration,
}

impl PhaseRecord {
    pub fn items_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.items as f64 / secs
        } else {
            0.0
        }
    }
}

/// 依序累積各階段紀錄，不論是否開啟系統監控
#[derive(Debug)]
struct PhaseLog {
    last_mark: Mutex<Instant>,
    records: Mutex<Vec<PhaseRecord>>,
}

impl PhaseLog {
    fn new() -> Self {
        Self {
            last_mark: Mutex::new(Instant::now()),
            records: Mutex::new(Vec::new()),
        }
    }

    fn reset(&self) {
        if let Ok(mut mark) = self.last_mark.lock() {
            *mark = Instant::now();
        }
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    fn record(&self, phase: Phase, items: usize) -> PhaseRecord {
        let now = Instant::now();
        let elapsed = match self.last_mark.lock() {
            Ok(mut mark) => {
                let elapsed = now.duration_since(*mark);
                *mark = now;
                elapsed
            }
            Err(_) => Duration::ZERO,
        };

        let record = PhaseRecord {
            phase,
            items,
            elapsed,
        };
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        record
    }

    fn snapshot(&self) -> Vec<PhaseRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn summary_line(&self) -> String {
        let records = self.snapshot();
        let count = |phase: Phase| {
            records
                .iter()
                .find(|r| r.phase == phase)
                .map(|r| r.items)
                .unwrap_or(0)
        };
        format!(
            "{} message(s) -> {} record(s), {} loaded",
            count(Phase::Extract),
            count(Phase::Transform),
            count(Phase::Load)
        )
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// 記錄掃描各階段的筆數與耗時；`--monitor` 時另外記錄 CPU 與記憶體
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    start_time: Instant,
    peak_memory: Arc<Mutex<u64>>,
    phases: PhaseLog,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                if enabled {
                    tracing::warn!("System monitoring unavailable: {}", e);
                }
                None
            }
        };

        Self {
            system: Arc::new(Mutex::new(System::new())),
            pid,
            start_time: Instant::now(),
            peak_memory: Arc::new(Mutex::new(0)),
            phases: PhaseLog::new(),
            enabled: enabled && pid.is_some(),
        }
    }

    pub fn get_stats(&self) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }

        Some(SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    /// 新的一輪從這裡開始計時
    pub fn start(&self) {
        self.phases.reset();
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 Start - CPU: {:.1}%, Memory: {}MB",
                stats.cpu_usage,
                stats.memory_usage_mb
            );
        }
    }

    pub fn record_phase(&self, phase: Phase, items: usize) -> PhaseRecord {
        let record = self.phases.record(phase, items);
        match self.get_stats() {
            Some(stats) => tracing::info!(
                "📊 {} - {} item(s) in {:?} ({:.1}/s), CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                phase,
                items,
                record.elapsed,
                record.items_per_sec(),
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb
            ),
            None => tracing::debug!("{} - {} item(s) in {:?}", phase, items, record.elapsed),
        }
        record
    }

    pub fn phases(&self) -> Vec<PhaseRecord> {
        self.phases.snapshot()
    }

    pub fn log_final_stats(&self) {
        let counts = self.phases.summary_line();
        match self.get_stats() {
            Some(stats) => tracing::info!(
                "📊 Final Stats - {}, Total Time: {:?}, Peak Memory: {}MB",
                counts,
                stats.elapsed_time,
                stats.peak_memory_mb
            ),
            None => tracing::debug!("Final counts - {}", counts),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(not(feature = "cli"))]
pub struct SystemMonitor {
    phases: PhaseLog,
}

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self {
            phases: PhaseLog::new(),
        }
    }

    pub fn start(&self) {
        self.phases.reset();
    }

    pub fn record_phase(&self, phase: Phase, items: usize) -> PhaseRecord {
        let record = self.phases.record(phase, items);
        tracing::debug!("{} - {} item(s) in {:?}", phase, items, record.elapsed);
        record
    }

    pub fn phases(&self) -> Vec<PhaseRecord> {
        self.phases.snapshot()
    }

    pub fn log_final_stats(&self) {
        tracing::debug!("Final counts - {}", self.phases.summary_line());
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(not(feature = "cli"))]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_counts_recorded_without_system_stats() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());

        monitor.start();
        monitor.record_phase(Phase::Extract, 12);
        monitor.record_phase(Phase::Transform, 9);
        monitor.record_phase(Phase::Load, 9);

        let phases = monitor.phases();
        let counts: Vec<(Phase, usize)> = phases.iter().map(|r| (r.phase, r.items)).collect();
        assert_eq!(
            counts,
            vec![(Phase::Extract, 12), (Phase::Transform, 9), (Phase::Load, 9)]
        );
        assert_eq!(
            monitor.phases.summary_line(),
            "12 message(s) -> 9 record(s), 9 loaded"
        );

        // 重新開始會清掉上一輪
        monitor.start();
        assert!(monitor.phases().is_empty());
    }

    #[test]
    fn test_throughput_handles_zero_elapsed() {
        let record = PhaseRecord {
            phase: Phase::Load,
            items: 5,
            elapsed: Duration::ZERO,
        };
        assert_eq!(record.items_per_sec(), 0.0);

        let record = PhaseRecord {
            elapsed: Duration::from_millis(500),
            ..record
        };
        assert_eq!(record.items_per_sec(), 10.0);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(monitor.get_stats().is_none());
    }
}
