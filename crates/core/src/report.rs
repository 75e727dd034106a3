use crate::processor::{ProcessResult, ProcessStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[ProcessResult]) -> Self {
        results.iter().fold(
            RunSummary {
                total: results.len(),
                ..RunSummary::default()
            },
            |mut summary, result| {
                match result.status {
                    ProcessStatus::Success => summary.success += 1,
                    ProcessStatus::Skipped => summary.skipped += 1,
                    ProcessStatus::Failed => summary.failed += 1,
                }
                summary
            },
        )
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "処理完了: 合計 {}件 (成功: {}件, スキップ: {}件, 失敗: {}件)",
            self.total, self.success, self.skipped, self.failed
        )
    }
}
