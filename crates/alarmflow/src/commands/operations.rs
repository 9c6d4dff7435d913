//! Operation command handlers.

use std::fmt::Write as _;
use std::time::Duration;

use tabled::Tabled;

use alarmflow_core::{FileOperationStore, Operation, OperationId, OperationStore};

use crate::cli::{GlobalOpts, OperationsArgs, OperationsCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Alarm time")]
    time: String,
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "Keywords")]
    keywords: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl OperationRow {
    fn new(op: &Operation, color: bool) -> Self {
        Self {
            id: id_of(op),
            time: format_time(op),
            number: op.operation_number.clone().unwrap_or_default(),
            keywords: op.keywords.to_string(),
            location: op.destination_location().to_string(),
            status: output::ack_label(op.is_acknowledged, color),
        }
    }
}

fn id_of(op: &Operation) -> String {
    op.id.map(|id| id.to_string()).unwrap_or_default()
}

fn format_time(op: &Operation) -> String {
    op.timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn detail(op: &Operation, color: bool) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: &str| {
        if !value.trim().is_empty() {
            let _ = writeln!(out, "{} {value}", output::dim(&format!("{label:<14}"), color));
        }
    };

    line("ID", &id_of(op));
    line("Number", op.operation_number.as_deref().unwrap_or(""));
    line("Alarm time", &format_time(op));
    line(
        "Received",
        &op.timestamp_income.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    line("Status", &output::ack_label(op.is_acknowledged, color));
    line("Messenger", op.messenger.as_deref().unwrap_or(""));
    line("Priority", op.priority.as_deref().unwrap_or(""));
    line("Keywords", &op.keywords.to_string());
    line("Picture", op.picture.as_deref().unwrap_or(""));
    line("Location", &op.einsatzort.to_string());
    line("Property", op.einsatzort.property.as_deref().unwrap_or(""));
    line("Destination", &op.zielort.to_string());
    line("Plan", op.operation_plan.as_deref().unwrap_or(""));
    line("Comment", op.comment.as_deref().unwrap_or(""));

    let resources: Vec<&str> = op.resources.iter().map(|r| r.full_name.as_str()).collect();
    line("Resources", &resources.join(", "));
    for (key, value) in &op.custom_data {
        let value = value
            .as_str()
            .map_or_else(|| value.to_string(), str::to_owned);
        line(key, &value);
    }

    out.trim_end().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: OperationsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    if cfg.engine.operation_store != "file" {
        tracing::warn!(
            store = %cfg.engine.operation_store,
            "engine is not configured for the file store; showing its directory anyway"
        );
    }
    let store = FileOperationStore::open(&cfg.store.directory)?;
    let color = output::should_color(&global.color);

    match args.command {
        OperationsCommand::List {
            max_age_minutes,
            unacknowledged,
            limit,
        } => {
            let max_age = max_age_minutes
                .map(|minutes| {
                    minutes
                        .checked_mul(60)
                        .map(Duration::from_secs)
                        .ok_or_else(|| CliError::Validation {
                            field: "max-age-minutes".into(),
                            reason: format!("{minutes} minutes is out of range"),
                        })
                })
                .transpose()?;

            let ids = store.get_operation_ids(max_age, unacknowledged, limit)?;
            let mut operations = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(op) = store.get_operation_by_id(id)? {
                    operations.push(op);
                }
            }

            let out = output::render_list(
                &global.output,
                &operations,
                |op| OperationRow::new(op, color),
                id_of,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OperationsCommand::Show { id } => {
            let op = store
                .get_operation_by_id(OperationId(id))?
                .ok_or(alarmflow_core::CoreError::OperationNotFound { id })?;
            let out = output::render_single(&global.output, &op, |op| detail(op, color), id_of)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OperationsCommand::Ack { id } => {
            store.acknowledge_operation(OperationId(id))?;
            if !global.quiet {
                eprintln!("Operation {id} acknowledged");
            }
            Ok(())
        }
    }
}
