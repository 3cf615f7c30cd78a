use std::fmt::Write;

use schemashift_db::{MigrateReport, MigrationState, RolledBack, StatusReport};

pub fn render_migrate(report: &MigrateReport) -> String {
    if report.applied.is_empty() {
        return format!(
            "Nothing to migrate ({} already applied).",
            report.skipped
        );
    }
    format!(
        "Applied {} migration(s): {} ({} already applied).",
        report.applied.len(),
        report.applied.join(", "),
        report.skipped
    )
}

pub fn render_rollback(undone: Option<&RolledBack>) -> String {
    match undone {
        Some(m) => format!("Rolled back {}: {}", m.version, m.description),
        None => "No migrations to roll back.".to_string(),
    }
}

pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    for m in &report.migrations {
        let state = match &m.state {
            MigrationState::Applied { applied_at } => {
                format!("applied {}", applied_at.format("%Y-%m-%d %H:%M:%S"))
            }
            MigrationState::Pending => "pending".to_string(),
        };
        let _ = writeln!(out, "{:<10} {:<28} {}", m.version, state, m.description);
    }
    for record in &report.orphaned {
        let _ = writeln!(
            out,
            "{:<10} {:<28} {} (not in registry)",
            record.version, "orphaned", record.description
        );
    }
    if out.is_empty() {
        out.push_str("No migrations defined.\n");
    } else {
        let _ = writeln!(out, "{} pending", report.pending().count());
    }
    out
}

pub fn render_status_json(report: &StatusReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
