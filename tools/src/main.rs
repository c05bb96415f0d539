//! review-runner: headless driver for the two-tier SAR review workflow.
//!
//! Usage:
//!   review-runner --batch batch.json [--alerts alerts.json] [--config review.json]
//!   review-runner --batch batch.json --ipc-mode [--out-dir ./reports]
//!
//! Batch and alert files are JSON tables: `{ "columns": [...], "rows": [[...], ...] }`.

use anyhow::{Context, Result};
use sar_review_core::{
    command::ReviewCommand,
    config::ReviewConfig,
    event::{event_type_name, WorkflowEvent},
    normalizer::RawTable,
    report::{render_report, PlainTextRenderer},
    rules::BatchWarning,
    types::{format_currency, CaseId},
    workflow::{CaseStage, EscalationRecord, FlaggedCaseRow, Tier2QueueStatus, WorkflowSession},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    ReviewTier2 { case_id: CaseId },
    Review { command: ReviewCommand },
    Render { case_id: CaseId },
    Quit,
}

#[derive(serde::Serialize)]
struct CaseView {
    #[serde(flatten)]
    row: FlaggedCaseRow,
    stage: CaseStage,
}

#[derive(serde::Serialize)]
struct UiState<'a> {
    session_id: &'a str,
    selected: Option<&'a str>,
    cases: Vec<CaseView>,
    warnings: &'a [BatchWarning],
    tier2_status: Tier2QueueStatus,
    tier2_queue: Vec<&'a EscalationRecord>,
    events: Vec<WorkflowEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    under_review: Option<&'a EscalationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let batch_path = arg_value(&args, "--batch").context("--batch <path> is required")?;
    let alerts_path = arg_value(&args, "--alerts");
    let out_dir = arg_value(&args, "--out-dir").unwrap_or(".");

    let config = match arg_value(&args, "--config") {
        Some(path) => ReviewConfig::load(path)?,
        None => ReviewConfig::default(),
    };

    let batch = read_table(batch_path)?;
    let alerts = alerts_path.map(read_table).transpose()?;
    let mut session = WorkflowSession::load(&batch, alerts.as_ref(), config)
        .with_context(|| format!("Cannot load batch {batch_path}"))?;

    if ipc_mode {
        run_ipc_loop(&mut session, Path::new(out_dir))?;
    } else {
        print_summary(&session, batch_path, alerts_path);
    }
    Ok(())
}

fn read_table(path: &str) -> Result<RawTable> {
    RawTable::read_json(path).with_context(|| format!("Cannot load table {path}"))
}

fn run_ipc_loop(session: &mut WorkflowSession, out_dir: &Path) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let mut events = Vec::new();
        let mut written = None;
        let mut under_review = None;
        let mut error = None;

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {}
            IpcCommand::ReviewTier2 { case_id } => match session.review_tier2(&case_id) {
                Ok(record) => under_review = Some(record.sequence),
                Err(e) => error = Some(e.to_string()),
            },
            IpcCommand::Review { command } => match session.apply(command) {
                Ok(emitted) => {
                    for event in &emitted {
                        log::debug!("{} case={}", event_type_name(event), event.case_id());
                    }
                    events = emitted;
                }
                Err(e) => error = Some(e.to_string()),
            },
            IpcCommand::Render { case_id } => match write_report(session, &case_id, out_dir) {
                Ok(path) => written = Some(path),
                Err(e) => error = Some(format!("{e:#}")),
            },
        }

        let under_review = under_review
            .and_then(|seq| session.escalation_history().get(seq as usize - 1));
        let state = build_ui_state(session, events, under_review, written, error);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn write_report(session: &WorkflowSession, case_id: &str, out_dir: &Path) -> Result<String> {
    let content = session
        .report(case_id)
        .with_context(|| format!("No report generated for case {case_id}"))?;
    let rendered = render_report(content, &PlainTextRenderer)?;
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(&rendered.file_name);
    std::fs::write(&path, &rendered.bytes)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(path.display().to_string())
}

fn build_ui_state<'a>(
    session: &'a WorkflowSession,
    events: Vec<WorkflowEvent>,
    under_review: Option<&'a EscalationRecord>,
    written: Option<String>,
    error: Option<String>,
) -> UiState<'a> {
    let cases = session
        .flagged_table()
        .into_iter()
        .map(|row| {
            let stage = session.stage(&row.case_id).unwrap_or_default();
            CaseView { row, stage }
        })
        .collect();

    UiState {
        session_id: session.session_id(),
        selected: session.selected(),
        cases,
        warnings: session.warnings(),
        tier2_status: session.tier2_queue_status(),
        tier2_queue: session.tier2_queue(),
        events,
        under_review,
        written,
        error,
    }
}

fn print_summary(session: &WorkflowSession, batch_path: &str, alerts_path: Option<&str>) {
    let config = session.config();
    println!("SAR Review - review-runner");
    println!("  session:    {}", session.session_id());
    println!("  batch:      {batch_path}");
    println!("  alerts:     {}", alerts_path.unwrap_or("(none)"));
    println!("  threshold:  {}", format_currency(config.high_value_threshold));
    println!();

    println!("=== FLAGGED CASES ({} of {} rows) ===", session.cases().len(), session.table().len());
    if session.cases().is_empty() {
        println!("  (No transactions flagged)");
    }
    for row in session.flagged_table() {
        println!(
            "  {:<16} {:<14} {:>14}  {}",
            row.case_id,
            row.sender,
            format_currency(row.amount),
            row.flags
        );
    }

    if !session.warnings().is_empty() {
        println!();
        println!("=== WARNINGS ===");
        for warning in session.warnings() {
            let BatchWarning::DuplicateCaseId { case_id, rows } = warning;
            println!("  duplicate case id {case_id} on rows {rows:?}");
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
