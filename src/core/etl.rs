use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::{Phase, PhaseRecord, SystemMonitor};

/// 依序執行 extract → transform → load，並在每個階段記錄筆數與資源用量
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// 最近一次 `run` 各階段的筆數與耗時
    pub fn phases(&self) -> Vec<PhaseRecord> {
        self.monitor.phases()
    }

    pub async fn run(&self) -> Result<P::Report> {
        tracing::info!("🚀 Starting pipeline");
        self.monitor.start();

        tracing::info!("Extracting...");
        let raw = self.pipeline.extract().await?;
        tracing::info!("Extracted {} item(s)", raw.len());
        self.monitor.record_phase(Phase::Extract, raw.len());

        tracing::info!("Transforming...");
        let transformed = self.pipeline.transform(raw).await?;
        tracing::info!("Transformed into {} record(s)", transformed.len());
        self.monitor.record_phase(Phase::Transform, transformed.len());

        tracing::info!("Loading...");
        let loading = transformed.len();
        let report = self.pipeline.load(transformed).await?;
        self.monitor.record_phase(Phase::Load, loading);

        tracing::info!("✅ Pipeline finished");
        self.monitor.log_final_stats();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Doubler {
        loaded: Mutex<Vec<i32>>,
    }

    #[async_trait]
    impl Pipeline for Doubler {
        type Input = i32;
        type Output = i32;
        type Report = usize;

        async fn extract(&self) -> Result<Vec<i32>> {
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<i32>) -> Result<Vec<i32>> {
            Ok(data.into_iter().map(|n| n * 2).collect())
        }

        async fn load(&self, records: Vec<i32>) -> Result<usize> {
            let count = records.len();
            self.loaded.lock().unwrap().extend(records);
            Ok(count)
        }
    }

    #[tokio::test]
    async fn test_runs_all_phases_in_order() {
        let engine = EtlEngine::new(Doubler {
            loaded: Mutex::new(Vec::new()),
        });

        let report = engine.run().await.unwrap();

        assert_eq!(report, 3);
        assert_eq!(*engine.pipeline().loaded.lock().unwrap(), vec![2, 4, 6]);

        let phases: Vec<Phase> = engine.phases().iter().map(|r| r.phase).collect();
        assert_eq!(phases, vec![Phase::Extract, Phase::Transform, Phase::Load]);
        assert!(engine.phases().iter().all(|r| r.items == 3));
    }
}
