use crate::config::AppConfig;
use crate::conflict::{ConflictHandler, Resolution};
use crate::file_ops::{copy_file, FileOpError, Transfer};
use crate::metadata::extract_metadata;
use crate::rule::{OperationKind, Rule};
use crate::rule_engine::{destination_for, rule_matches, RuleEngine};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Enumerating,
    Analyzing,
    Executing,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Enumerating => "ファイルリスト作成中",
            Phase::Analyzing => "ファイル分析中",
            Phase::Executing => "ファイル処理実行中",
        }
    }
}

/// `total == 0` means the denominator is still unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub phase: Phase,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanError {
    #[error("ルールが見つかりません: {0}")]
    RuleNotFound(String),
    #[error("メタデータを取得できませんでした")]
    MetadataUnavailable,
    #[error("選択されたルールに一致しませんでした")]
    NotMatched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum Plan {
    Ready {
        rule: Rule,
        destination_path: PathBuf,
    },
    Unplannable {
        error: PlanError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub source_path: PathBuf,
    #[serde(flatten)]
    pub plan: Plan,
}

impl PlannedOperation {
    pub fn ready(source_path: PathBuf, rule: Rule, destination_path: PathBuf) -> Self {
        Self {
            source_path,
            plan: Plan::Ready {
                rule,
                destination_path,
            },
        }
    }

    pub fn unplannable(source_path: PathBuf, error: PlanError) -> Self {
        Self {
            source_path,
            plan: Plan::Unplannable { error },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.plan, Plan::Ready { .. })
    }

    pub fn rule(&self) -> Option<&Rule> {
        match &self.plan {
            Plan::Ready { rule, .. } => Some(rule),
            Plan::Unplannable { .. } => None,
        }
    }

    pub fn destination_path(&self) -> Option<&Path> {
        match &self.plan {
            Plan::Ready {
                destination_path, ..
            } => Some(destination_path),
            Plan::Unplannable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PlanError> {
        match &self.plan {
            Plan::Ready { .. } => None,
            Plan::Unplannable { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub status: ProcessStatus,
    pub matched_rule: String,
    pub error_message: Option<String>,
    pub operation: OperationKind,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("処理がユーザーによってキャンセルされました")]
    Cancelled,
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// The blanket conflict resolution lives here, so a new processor is needed per run.
pub struct FileProcessor {
    engine: RuleEngine,
    conflict_handler: Option<Box<dyn ConflictHandler>>,
    blanket_resolution: Option<Resolution>,
}

impl FileProcessor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            engine: RuleEngine::new(rules),
            conflict_handler: None,
            blanket_resolution: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rules.clone())
    }

    pub fn with_conflict_handler(mut self, handler: impl ConflictHandler + 'static) -> Self {
        self.conflict_handler = Some(Box::new(handler));
        self
    }

    pub fn blanket_resolution(&self) -> Option<&Resolution> {
        self.blanket_resolution.as_ref()
    }

    pub fn discover(
        &self,
        paths: &[PathBuf],
        rule_id: &str,
        mut on_progress: impl FnMut(Progress),
        is_cancelled: impl Fn() -> bool,
    ) -> Result<Vec<PlannedOperation>, RunError> {
        let files = collect_files(paths, &mut on_progress, &is_cancelled)?;

        let Some(rule) = self.engine.find_rule(rule_id) else {
            tracing::warn!(rule_id, "選択されたルールが見つかりません");
            return Ok(files
                .into_iter()
                .map(|path| {
                    PlannedOperation::unplannable(path, PlanError::RuleNotFound(rule_id.to_string()))
                })
                .collect());
        };

        let total = files.len();
        let mut operations = Vec::with_capacity(total);
        for (index, path) in files.into_iter().enumerate() {
            if is_cancelled() {
                return Err(RunError::Cancelled);
            }
            on_progress(Progress {
                current: index + 1,
                total,
                phase: Phase::Analyzing,
            });

            let Some(metadata) = extract_metadata(&path) else {
                operations.push(PlannedOperation::unplannable(
                    path,
                    PlanError::MetadataUnavailable,
                ));
                continue;
            };

            if rule_matches(rule, &metadata) {
                let destination = destination_for(rule, &metadata);
                operations.push(PlannedOperation::ready(path, rule.clone(), destination));
            } else {
                operations.push(PlannedOperation::unplannable(path, PlanError::NotMatched));
            }
        }

        tracing::info!(
            rule = %rule.name,
            files = total,
            ready = operations.iter().filter(|op| op.is_ready()).count(),
            "分析が完了しました"
        );
        Ok(operations)
    }

    pub fn execute(
        &mut self,
        operations: &[PlannedOperation],
        mut on_progress: impl FnMut(Progress),
        is_cancelled: impl Fn() -> bool,
    ) -> Result<Vec<ProcessResult>, RunError> {
        let ready: Vec<(&Path, &Rule, &Path)> = operations
            .iter()
            .filter_map(|op| match &op.plan {
                Plan::Ready {
                    rule,
                    destination_path,
                } => Some((op.source_path.as_path(), rule, destination_path.as_path())),
                Plan::Unplannable { .. } => None,
            })
            .collect();

        let total = ready.len();
        let mut results = Vec::with_capacity(total);
        for (index, (source, rule, destination)) in ready.into_iter().enumerate() {
            if is_cancelled() {
                return Err(RunError::Cancelled);
            }
            on_progress(Progress {
                current: index + 1,
                total,
                phase: Phase::Executing,
            });
            results.push(self.execute_operation(source, rule, destination));
        }

        tracing::info!(
            total,
            failed = results
                .iter()
                .filter(|r| r.status == ProcessStatus::Failed)
                .count(),
            "ファイル処理が完了しました"
        );
        Ok(results)
    }

    /// The rule's declared operation is ignored: this never moves.
    pub fn execute_operation(
        &mut self,
        source: &Path,
        rule: &Rule,
        destination: &Path,
    ) -> ProcessResult {
        let mut result = ProcessResult {
            source_path: source.to_path_buf(),
            destination_path: destination.to_path_buf(),
            status: ProcessStatus::Failed,
            matched_rule: rule.name.clone(),
            error_message: None,
            operation: OperationKind::Copy,
        };

        let outcome = match copy_file(source, destination, false) {
            Ok(Transfer::Done) => Ok(()),
            Ok(Transfer::Conflict) => match self.conflict_resolution(source, destination) {
                Resolution::Skip => {
                    result.status = ProcessStatus::Skipped;
                    return result;
                }
                Resolution::Overwrite => {
                    settle(destination, copy_file(source, destination, true))
                }
                Resolution::RenameTo(renamed) => {
                    let outcome = settle(&renamed, copy_file(source, &renamed, false));
                    result.destination_path = renamed;
                    outcome
                }
                Resolution::Error => Err(conflict_message(destination)),
            },
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(()) => result.status = ProcessStatus::Success,
            Err(message) => result.error_message = Some(message),
        }
        result
    }

    fn conflict_resolution(&mut self, source: &Path, destination: &Path) -> Resolution {
        if let Some(blanket) = &self.blanket_resolution {
            tracing::debug!(destination = %destination.display(), resolution = ?blanket, "一括指定の解決方法を適用します");
            return blanket.clone();
        }
        let Some(handler) = &self.conflict_handler else {
            return Resolution::Error;
        };

        tracing::debug!(source = %source.display(), destination = %destination.display(), "競合を検出しました");
        let decision = handler.resolve(source, destination);
        if decision.apply_to_all && decision.resolution.is_blanket_eligible() {
            tracing::debug!(resolution = ?decision.resolution, "以降の競合にも同じ解決方法を適用します");
            self.blanket_resolution = Some(decision.resolution.clone());
        }
        decision.resolution
    }
}

fn settle(destination: &Path, outcome: Result<Transfer, FileOpError>) -> Result<(), String> {
    match outcome {
        Ok(Transfer::Done) => Ok(()),
        Ok(Transfer::Conflict) => Err(conflict_message(destination)),
        Err(err) => Err(err.to_string()),
    }
}

fn conflict_message(destination: &Path) -> String {
    format!(
        "移動先に同名のファイルが既に存在します: {}",
        destination.display()
    )
}

pub fn collect_files(
    paths: &[PathBuf],
    on_progress: &mut impl FnMut(Progress),
    is_cancelled: &impl Fn() -> bool,
) -> Result<Vec<PathBuf>, RunError> {
    let mut files = Vec::new();
    let mut found = |path: PathBuf, files: &mut Vec<PathBuf>| {
        files.push(path);
        on_progress(Progress {
            current: files.len(),
            total: 0,
            phase: Phase::Enumerating,
        });
    };

    for path in paths {
        if is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if !path.exists() {
            tracing::warn!(path = %path.display(), "存在しないパスはスキップします");
            continue;
        }
        if !path.is_dir() {
            found(path.clone(), &mut files);
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            if is_cancelled() {
                return Err(RunError::Cancelled);
            }
            let entry =
                entry.with_context(|| format!("フォルダ走査に失敗しました: {}", path.display()))?;
            // Links to directories are not followed and are not files either.
            if entry.file_type().is_dir() || entry.path().is_dir() {
                continue;
            }
            found(entry.into_path(), &mut files);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictDecision;
    use crate::exif_reader::tests::jpeg_with_exif;
    use crate::rule::{Condition, ConditionOperator, ConditionValue};
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn jpg_rule(id: &str, pattern: String) -> Rule {
        Rule {
            id: id.to_string(),
            ..Rule::new("Sort JPGs", pattern).with_condition(Condition::new(
                "extension",
                ConditionOperator::Equals,
                ConditionValue::Text(".jpg".to_string()),
            ))
        }
    }

    fn catch_all(id: &str, pattern: String) -> Rule {
        Rule {
            id: id.to_string(),
            ..Rule::new("All", pattern)
        }
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn discovery_renders_destination_from_capture_date() {
        let temp = tempdir().expect("tempdir");
        let source_dir = temp.path().join("source");
        fs::create_dir_all(&source_dir).expect("mkdir");
        let photo = source_dir.join("IMG_0001.jpg");
        fs::write(&photo, jpeg_with_exif("2023:10:27 10:00:00", "TestCam")).expect("write");

        let out = temp.path().join("out");
        let rule = jpg_rule("rule-jpg", format!("{}/{{year}}/{{filename}}.jpg", out.display()));
        let processor = FileProcessor::new(vec![rule]);

        let plans = processor
            .discover(&[source_dir], "rule-jpg", |_| {}, never)
            .expect("discover");
        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0].destination_path(),
            Some(out.join("2023").join("IMG_0001.jpg").as_path())
        );
        assert_eq!(plans[0].rule().map(|r| r.id.as_str()), Some("rule-jpg"));
    }

    #[test]
    fn discovery_reports_per_file_errors_and_keeps_going() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("in");
        fs::create_dir_all(dir.join("nested")).expect("mkdir");
        fs::write(dir.join("a.jpg"), b"a").expect("write");
        fs::write(dir.join("nested").join("b.txt"), b"b").expect("write");

        let processor = FileProcessor::new(vec![jpg_rule("r", "out/{filename}".to_string())]);
        let plans = processor
            .discover(
                &[dir.clone(), temp.path().join("missing")],
                "r",
                |_| {},
                never,
            )
            .expect("discover");

        assert_eq!(plans.len(), 2);
        assert!(plans[0].is_ready());
        assert_eq!(plans[0].source_path, dir.join("a.jpg"));
        assert_eq!(plans[1].error(), Some(&PlanError::NotMatched));
    }

    #[test]
    fn unknown_rule_degrades_every_file_to_an_error() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.jpg"), b"a").expect("write");
        fs::write(temp.path().join("b.jpg"), b"b").expect("write");

        let processor = FileProcessor::new(vec![jpg_rule("r", "out".to_string())]);
        let plans = processor
            .discover(&[temp.path().to_path_buf()], "nope", |_| {}, never)
            .expect("discover");
        assert_eq!(plans.len(), 2);
        assert!(plans
            .iter()
            .all(|p| p.error() == Some(&PlanError::RuleNotFound("nope".to_string()))));
    }

    #[test]
    fn discovery_progress_is_monotonic_per_phase() {
        let temp = tempdir().expect("tempdir");
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        let processor = FileProcessor::new(vec![catch_all("r", "out".to_string())]);
        let seen = RefCell::new(Vec::new());
        processor
            .discover(
                &[temp.path().to_path_buf()],
                "r",
                |p| seen.borrow_mut().push(p),
                never,
            )
            .expect("discover");

        let seen = seen.into_inner();
        let enumerating: Vec<(usize, usize)> = seen
            .iter()
            .filter(|p| p.phase == Phase::Enumerating)
            .map(|p| (p.current, p.total))
            .collect();
        let analyzing: Vec<(usize, usize)> = seen
            .iter()
            .filter(|p| p.phase == Phase::Analyzing)
            .map(|p| (p.current, p.total))
            .collect();
        assert_eq!(enumerating, vec![(1, 0), (2, 0), (3, 0)]);
        assert_eq!(analyzing, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn cancelled_discovery_returns_cancellation() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.jpg"), b"x").expect("write");
        let processor = FileProcessor::new(vec![catch_all("r", "out".to_string())]);
        let err = processor
            .discover(&[temp.path().to_path_buf()], "r", |_| {}, || true)
            .expect_err("must cancel");
        assert!(matches!(err, RunError::Cancelled));
    }

    #[test]
    fn discovery_cancelled_during_analysis() {
        let temp = tempdir().expect("tempdir");
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        let processor = FileProcessor::new(vec![catch_all("r", "out".to_string())]);
        let cancel = Cell::new(false);
        let last_analyzed = Cell::new(0);
        let err = processor
            .discover(
                &[temp.path().to_path_buf()],
                "r",
                |p| {
                    if p.phase == Phase::Analyzing {
                        last_analyzed.set(p.current);
                        if p.current == 2 {
                            cancel.set(true);
                        }
                    }
                },
                || cancel.get(),
            )
            .expect_err("must cancel");

        assert!(matches!(err, RunError::Cancelled));
        assert_eq!(last_analyzed.get(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_not_collected_as_a_file() {
        let temp = tempdir().expect("tempdir");
        let real = temp.path().join("real");
        let input = temp.path().join("in");
        fs::create_dir_all(&real).expect("mkdir");
        fs::create_dir_all(&input).expect("mkdir");
        fs::write(real.join("inner.txt"), b"x").expect("write");
        fs::write(input.join("a.txt"), b"a").expect("write");
        std::os::unix::fs::symlink(&real, input.join("linkdir")).expect("symlink");

        let files = collect_files(&[input.clone()], &mut |_: Progress| {}, &never).expect("collect");
        assert_eq!(files, vec![input.join("a.txt")]);
    }

    #[test]
    fn execution_copies_and_keeps_source_even_for_move_rules() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("test_image.jpg");
        fs::write(&source, b"dummy image content").expect("write");

        let out = temp.path().join("destination");
        let mut rule = jpg_rule("r", format!("{}/{{year}}/{{filename}}.{{extension}}", out.display()));
        rule.operation = OperationKind::Move;
        let mut processor = FileProcessor::new(vec![rule]);

        let plans = processor
            .discover(&[source.clone()], "r", |_| {}, never)
            .expect("discover");
        let results = processor
            .execute(&plans, |_| {}, never)
            .expect("execute");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProcessStatus::Success);
        assert_eq!(results[0].operation, OperationKind::Copy);
        assert_eq!(results[0].matched_rule, "Sort JPGs");
        assert!(source.exists());
        assert!(results[0].destination_path.exists());
    }

    #[test]
    fn execution_ignores_unplannable_entries() {
        let temp = tempdir().expect("tempdir");
        let mut processor = FileProcessor::new(Vec::new());
        let plans = vec![PlannedOperation::unplannable(
            temp.path().join("x"),
            PlanError::NotMatched,
        )];
        let results = processor
            .execute(&plans, |_| {}, never)
            .expect("execute");
        assert!(results.is_empty());
    }

    #[test]
    fn conflict_without_handler_fails() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, b"new").expect("write");
        fs::write(&dest, b"old").expect("write");

        let rule = catch_all("r", "unused".to_string());
        let mut processor = FileProcessor::new(vec![rule.clone()]);
        let result = processor.execute_operation(&source, &rule, &dest);
        assert_eq!(result.status, ProcessStatus::Failed);
        assert!(result.error_message.is_some());
        assert_eq!(fs::read(&dest).expect("read"), b"old");
    }

    #[test]
    fn conflict_skip_leaves_destination_unchanged() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, b"new").expect("write");
        fs::write(&dest, b"old").expect("write");

        let rule = catch_all("r", "unused".to_string());
        let mut processor = FileProcessor::new(vec![rule.clone()])
            .with_conflict_handler(|_: &Path, _: &Path| ConflictDecision::once(Resolution::Skip));
        let result = processor.execute_operation(&source, &rule, &dest);
        assert_eq!(result.status, ProcessStatus::Skipped);
        assert_eq!(result.error_message, None);
        assert_eq!(fs::read(&dest).expect("read"), b"old");
        assert!(processor.blanket_resolution().is_none());
    }

    #[test]
    fn conflict_overwrite_replaces_destination() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, b"new").expect("write");
        fs::write(&dest, b"old").expect("write");

        let rule = catch_all("r", "unused".to_string());
        let mut processor = FileProcessor::new(vec![rule.clone()]).with_conflict_handler(
            |_: &Path, _: &Path| ConflictDecision::once(Resolution::Overwrite),
        );
        let result = processor.execute_operation(&source, &rule, &dest);
        assert_eq!(result.status, ProcessStatus::Success);
        assert_eq!(fs::read(&dest).expect("read"), b"new");
    }

    #[test]
    fn conflict_rename_writes_new_path_only() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        let renamed = temp.path().join("b_1.txt");
        fs::write(&source, b"new").expect("write");
        fs::write(&dest, b"old").expect("write");

        let rule = catch_all("r", "unused".to_string());
        let target = renamed.clone();
        let mut processor = FileProcessor::new(vec![rule.clone()]).with_conflict_handler(
            move |_: &Path, _: &Path| ConflictDecision::for_all(Resolution::RenameTo(target.clone())),
        );
        let result = processor.execute_operation(&source, &rule, &dest);
        assert_eq!(result.status, ProcessStatus::Success);
        assert_eq!(result.destination_path, renamed);
        assert_eq!(fs::read(&renamed).expect("read"), b"new");
        assert_eq!(fs::read(&dest).expect("read"), b"old");
        assert!(
            processor.blanket_resolution().is_none(),
            "rename must not become a blanket resolution"
        );
    }

    #[test]
    fn conflict_error_resolution_fails_the_item() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&source, b"new").expect("write");
        fs::write(&dest, b"old").expect("write");

        let rule = catch_all("r", "unused".to_string());
        let mut processor = FileProcessor::new(vec![rule.clone()])
            .with_conflict_handler(|_: &Path, _: &Path| ConflictDecision::for_all(Resolution::Error));
        let result = processor.execute_operation(&source, &rule, &dest);
        assert_eq!(result.status, ProcessStatus::Failed);
        assert!(processor.blanket_resolution().is_none());
    }

    #[test]
    fn overwrite_for_all_is_applied_without_prompting_again() {
        let temp = tempdir().expect("tempdir");
        let inputs: Vec<PathBuf> = ["1.txt", "2.txt", "3.txt"]
            .iter()
            .map(|name| {
                let path = temp.path().join(name);
                fs::write(&path, name.as_bytes()).expect("write");
                path
            })
            .collect();
        let shared_dest = temp.path().join("out").join("same.txt");

        let prompts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&prompts);
        let rule = catch_all("r", format!("{}", shared_dest.display()));
        let mut processor = FileProcessor::new(vec![rule.clone()]).with_conflict_handler(
            move |_: &Path, _: &Path| {
                counter.fetch_add(1, Ordering::SeqCst);
                ConflictDecision::for_all(Resolution::Overwrite)
            },
        );

        let plans: Vec<PlannedOperation> = inputs
            .iter()
            .map(|p| PlannedOperation::ready(p.clone(), rule.clone(), shared_dest.clone()))
            .collect();
        let results = processor
            .execute(&plans, |_| {}, never)
            .expect("execute");

        assert!(results.iter().all(|r| r.status == ProcessStatus::Success));
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(processor.blanket_resolution(), Some(&Resolution::Overwrite));
        assert_eq!(fs::read(&shared_dest).expect("read"), b"3.txt");
    }

    #[test]
    fn skip_for_all_is_applied_without_prompting_again() {
        let temp = tempdir().expect("tempdir");
        let out = temp.path().join("out");
        fs::create_dir_all(&out).expect("mkdir");
        let rule = catch_all("r", "unused".to_string());
        let plans: Vec<PlannedOperation> = (0..3)
            .map(|i| {
                let source = temp.path().join(format!("{i}.txt"));
                let dest = out.join(format!("{i}.txt"));
                fs::write(&source, b"new").expect("write");
                fs::write(&dest, b"old").expect("write");
                PlannedOperation::ready(source, rule.clone(), dest)
            })
            .collect();

        let prompts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&prompts);
        let mut processor = FileProcessor::new(vec![rule]).with_conflict_handler(
            move |_: &Path, _: &Path| {
                counter.fetch_add(1, Ordering::SeqCst);
                ConflictDecision::for_all(Resolution::Skip)
            },
        );
        let results = processor
            .execute(&plans, |_| {}, never)
            .expect("execute");

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == ProcessStatus::Skipped));
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(processor.blanket_resolution(), Some(&Resolution::Skip));
        for i in 0..3 {
            assert_eq!(fs::read(out.join(format!("{i}.txt"))).expect("read"), b"old");
        }
    }

    #[test]
    fn cancellation_between_items_stops_remaining_work() {
        let temp = tempdir().expect("tempdir");
        let out = temp.path().join("out");
        let rule = catch_all("r", "unused".to_string());
        let plans: Vec<PlannedOperation> = (0..4)
            .map(|i| {
                let source = temp.path().join(format!("{i}.txt"));
                fs::write(&source, b"x").expect("write");
                PlannedOperation::ready(source, rule.clone(), out.join(format!("{i}.txt")))
            })
            .collect();

        let cancel = Cell::new(false);
        let mut processor = FileProcessor::new(vec![rule]);
        let err = processor
            .execute(
                &plans,
                |p| {
                    if p.current == 2 {
                        cancel.set(true);
                    }
                },
                || cancel.get(),
            )
            .expect_err("must cancel");

        assert!(matches!(err, RunError::Cancelled));
        assert!(out.join("0.txt").exists());
        assert!(out.join("1.txt").exists());
        assert!(!out.join("2.txt").exists());
        assert!(!out.join("3.txt").exists());
    }
}
