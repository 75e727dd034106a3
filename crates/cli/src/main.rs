use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shiwake_core::{
    app_paths, extract_metadata, load_config_from, save_config_to, spawn_discovery,
    spawn_execution, suggest_rename, unknown_placeholders, AppConfig, ConflictDecision, Plan,
    PlannedOperation, ProcessResult, ProcessStatus, Progress, Resolution, RuleEngine, RunHandle,
    RunSummary, WorkerEvent,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shiwake")]
#[command(about = "ルールに従ってファイルを振り分けてコピーします")]
struct Cli {
    /// 設定ファイルのパス (省略時はOS標準の設定ディレクトリ)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Rules,
    Match(MatchArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// 省略時は前回選択したルール
    #[arg(long)]
    rule: Option<String>,
    /// プレビュー確認を省略して実行します
    #[arg(long, default_value_t = false)]
    yes: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct MatchArgs {
    file: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

enum Finished {
    Discovered(Vec<PlannedOperation>),
    Executed(Vec<ProcessResult>),
    Cancelled,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => app_paths()?.config_path,
    };

    match cli.command {
        Commands::Run(args) => cmd_run(args, &config_path),
        Commands::Rules => cmd_rules(&config_path),
        Commands::Match(args) => cmd_match(args, &config_path),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(&config_path),
            ConfigAction::Init => cmd_config_init(&config_path),
        },
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "shiwake=debug" } else { "shiwake=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("SHIWAKE_LOG").unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn cmd_run(args: RunArgs, config_path: &Path) -> Result<()> {
    let mut config = load_config_from(config_path)?;
    let rule_id = args
        .rule
        .or_else(|| config.last_selected_rule_id.clone())
        .context("--rule でルールIDを指定してください")?;
    let rule = config
        .rule(&rule_id)
        .with_context(|| format!("ルールが見つかりません: {rule_id}"))?;
    for placeholder in unknown_placeholders(&rule.destination_pattern) {
        tracing::warn!(rule = %rule.name, placeholder, "未対応のプレースホルダーはそのまま残ります");
    }

    if config.last_selected_rule_id.as_deref() != Some(rule_id.as_str()) {
        config.last_selected_rule_id = Some(rule_id.clone());
        save_config_to(&config, config_path)?;
    }

    let handle = spawn_discovery(&config, args.paths, rule_id)?;
    let plans = match drive(handle)? {
        Finished::Discovered(plans) => plans,
        Finished::Executed(_) => bail!("分析中に想定外の結果を受け取りました"),
        Finished::Cancelled => {
            eprintln!("処理を中止しました。");
            return Ok(());
        }
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Table => print_plans(&plans),
    }

    let ready = plans.iter().filter(|plan| plan.is_ready()).count();
    if ready == 0 {
        eprintln!("実行できる処理がありません。");
        return Ok(());
    }
    if config.preview_mode && !args.yes && !confirm(&format!("{ready}件のファイルをコピーしますか?"))? {
        eprintln!("プレビューのみで終了しました。実ファイルは変更していません。");
        return Ok(());
    }

    let handle = spawn_execution(&config, plans)?;
    let results = match drive(handle)? {
        Finished::Executed(results) => results,
        Finished::Discovered(_) => bail!("実行中に想定外の結果を受け取りました"),
        Finished::Cancelled => {
            eprintln!("処理を中止しました。");
            return Ok(());
        }
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Table => print_results(&results),
    }
    eprintln!("{}", RunSummary::from_results(&results));
    Ok(())
}

/// Pumps worker events on this thread until the worker hangs up.
fn drive(handle: RunHandle) -> Result<Finished> {
    let mut finished = None;
    let mut failure = None;

    while let Some(event) = handle.recv() {
        match event {
            WorkerEvent::Progress(progress) => show_progress(progress),
            WorkerEvent::Conflict(request) => {
                eprintln!();
                match ask_conflict(&request.source_path, &request.destination_path)? {
                    Some(decision) => request.respond(decision),
                    None => {
                        handle.cancel();
                        request.respond(ConflictDecision::once(Resolution::Skip));
                    }
                }
            }
            WorkerEvent::Discovered(plans) => finished = Some(Finished::Discovered(plans)),
            WorkerEvent::Executed(results) => finished = Some(Finished::Executed(results)),
            WorkerEvent::Cancelled => finished = Some(Finished::Cancelled),
            WorkerEvent::Failed(message) => failure = Some(message),
        }
    }
    eprintln!();
    handle.join()?;

    if let Some(message) = failure {
        bail!(message);
    }
    finished.context("ワーカーが結果を返さずに終了しました")
}

fn show_progress(progress: Progress) {
    if progress.total == 0 {
        eprint!("\r{}: {}件", progress.phase.label(), progress.current);
    } else {
        eprint!(
            "\r{}: {}/{}",
            progress.phase.label(),
            progress.current,
            progress.total
        );
    }
    let _ = io::stderr().flush();
}

/// `None` means the user asked to stop the run.
fn ask_conflict(source: &Path, destination: &Path) -> Result<Option<ConflictDecision>> {
    eprintln!("移動先に同名のファイルが既に存在します");
    eprintln!("  元ファイル: {}", source.display());
    eprintln!("  移動先    : {}", destination.display());

    loop {
        eprint!("[o]上書き [s]スキップ [r]リネーム [e]エラー [c]中止 (O/S で以降すべてに適用): ");
        io::stderr().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(Some(ConflictDecision::once(Resolution::Skip)));
        }
        let decision = match line.trim() {
            "o" => ConflictDecision::once(Resolution::Overwrite),
            "O" => ConflictDecision::for_all(Resolution::Overwrite),
            "s" | "" => ConflictDecision::once(Resolution::Skip),
            "S" => ConflictDecision::for_all(Resolution::Skip),
            "r" | "R" => {
                let renamed = suggest_rename(destination);
                eprintln!("  リネーム先: {}", renamed.display());
                ConflictDecision::once(Resolution::RenameTo(renamed))
            }
            "e" | "E" => ConflictDecision::once(Resolution::Error),
            "c" | "C" => return Ok(None),
            other => {
                eprintln!("不明な入力です: {other}");
                continue;
            }
        };
        return Ok(Some(decision));
    }
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn cmd_rules(config_path: &Path) -> Result<()> {
    let config = load_config_from(config_path)?;
    let engine = RuleEngine::new(config.rules);
    if engine.rules().is_empty() {
        println!("ルールが登録されていません: {}", config_path.display());
        return Ok(());
    }

    for rule in engine.rules() {
        let marker = if config.last_selected_rule_id.as_deref() == Some(rule.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} [{}] {} ({}) -> {}",
            rule.priority, rule.id, rule.name, rule.destination_pattern
        );
        for condition in &rule.conditions {
            println!(
                "      {} {} {}",
                condition.field,
                condition.operator.as_str(),
                serde_json::to_string(&condition.value)?
            );
        }
    }
    Ok(())
}

fn cmd_match(args: MatchArgs, config_path: &Path) -> Result<()> {
    let config = load_config_from(config_path)?;
    let metadata = extract_metadata(&args.file)
        .with_context(|| format!("メタデータを取得できませんでした: {}", args.file.display()))?;
    let engine = RuleEngine::new(config.rules);

    let matches = engine.find_all_matches(&metadata);
    if matches.is_empty() {
        println!("一致するルールはありません。");
        return Ok(());
    }
    for (rule, destination) in matches {
        println!("[{}] {} -> {}", rule.priority, rule.name, destination.display());
    }
    Ok(())
}

fn cmd_config_show(config_path: &Path) -> Result<()> {
    let config = load_config_from(config_path)?;
    println!("設定ファイル: {}", config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        bail!("設定ファイルは既に存在します: {}", config_path.display());
    }
    save_config_to(&AppConfig::default(), config_path)?;
    println!("設定ファイルを作成しました: {}", config_path.display());
    Ok(())
}

fn status_label(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Success => "成功",
        ProcessStatus::Skipped => "スキップ",
        ProcessStatus::Failed => "失敗",
    }
}

fn print_plans(plans: &[PlannedOperation]) {
    println!("元ファイル -> コピー先");
    for plan in plans {
        match &plan.plan {
            Plan::Ready {
                destination_path, ..
            } => println!(
                "{} -> {}",
                plan.source_path.display(),
                destination_path.display()
            ),
            Plan::Unplannable { error } => {
                println!("{} -> (対象外: {error})", plan.source_path.display())
            }
        }
    }

    let ready = plans.iter().filter(|plan| plan.is_ready()).count();
    println!(
        "\n集計: 対象={} 実行予定={} 対象外={}",
        plans.len(),
        ready,
        plans.len() - ready
    );
}

fn print_results(results: &[ProcessResult]) {
    for result in results {
        match &result.error_message {
            Some(message) => println!(
                "[{}] {} -> {} ({message})",
                status_label(result.status),
                result.source_path.display(),
                result.destination_path.display()
            ),
            None => println!(
                "[{}] {} -> {}",
                status_label(result.status),
                result.source_path.display(),
                result.destination_path.display()
            ),
        }
    }
}
