// SPDX-License-Identifier: GPL-3.0-only

use std::fmt::Write as _;

use num_format::{Locale, ToFormattedString};

use disksim_types::{
    Capabilities, DiskSummary, Operation, RegionView, Snapshot, format_size, format_size_detailed,
};

use crate::script::Response;

pub fn json(response: &Response) -> anyhow::Result<String> {
    Ok(serde_json::to_string(response)?)
}

pub fn text(response: &Response) -> String {
    match response {
        Response::Applied(outcome) => {
            let mut out = outcome.message.clone();
            if let Some(applied_mb) = outcome.applied_mb {
                let _ = write!(out, " [{} MB applied]", mb(applied_mb));
            }
            let _ = write!(out, "\n  {}", outcome.snapshot.layout_line());
            out
        }
        Response::Unchanged { message } => message.clone(),
        Response::Regions(snapshot) => region_table(snapshot),
        Response::Summary(summary) => summary_text(summary),
        Response::Capabilities {
            target,
            capabilities,
        } => capabilities_text(target, capabilities),
        Response::Rejected(error) => format!("rejected [{}]: {}", error.reason.as_str(), error.message),
    }
}

fn mb(value: u64) -> String {
    value.to_formatted_string(&Locale::en)
}

pub fn region_table(snapshot: &Snapshot) -> String {
    let mut out = format!(
        "{:<16} {:<12} {:<20} {:>8} {:>10} {:>10} {:<6} {:>10} {:<11}\n",
        "ID", "NAME", "TYPE", "SIZE", "MB", "OFFSET", "FS", "USED", "STATUS"
    );
    for view in &snapshot.regions {
        out.push_str(&region_row(view));
        out.push('\n');
    }
    let _ = write!(out, "Disk: {}", format_size_detailed(snapshot.total_mb));
    out
}

fn region_row(view: &RegionView) -> String {
    let id = if view.is_nested() {
        format!("  {}", view.id)
    } else {
        view.id.to_string()
    };
    let name = view.name.as_deref().unwrap_or("-");
    let file_system = view
        .file_system
        .map(|fs| fs.label().to_string())
        .unwrap_or_default();
    let used = if view.kind.is_partition() && view.file_system.is_some() {
        mb(view.used_mb)
    } else {
        String::new()
    };
    let status = view.status.map(|status| status.to_string()).unwrap_or_default();

    format!(
        "{:<16} {:<12} {:<20} {:>8} {:>10} {:>10} {:<6} {:>10} {:<11}",
        id,
        name,
        view.kind.display_name(),
        format_size(view.size_mb),
        mb(view.size_mb),
        mb(view.offset_mb),
        file_system,
        used,
        status
    )
    .trim_end()
    .to_string()
}

fn summary_text(summary: &DiskSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total:        {}", format_size_detailed(summary.total_mb));
    let _ = writeln!(out, "Allocated:    {}", format_size_detailed(summary.allocated_mb()));
    let _ = writeln!(
        out,
        "Unallocated:  {} ({:.1}%)",
        format_size_detailed(summary.unallocated_mb),
        summary.unallocated_percent()
    );
    if summary.has_extended {
        let _ = writeln!(
            out,
            "Extended free: {}",
            format_size_detailed(summary.extended_free_mb)
        );
    }
    let _ = write!(
        out,
        "Partitions:   {} primary, {} logical",
        summary.primary_count, summary.logical_count
    );
    out
}

fn capabilities_text(target: &str, capabilities: &Capabilities) -> String {
    let mut out = format!("{target}:");
    for operation in Operation::ALL {
        if !capabilities.is_supported(operation) {
            continue;
        }
        match capabilities.blocked_reason(operation) {
            None => {
                let _ = write!(out, "\n  {:<11} allowed", operation.as_str());
            }
            Some(reason) => {
                let message = capabilities.blocked_message(operation).unwrap_or_default();
                let _ = write!(
                    out,
                    "\n  {:<11} blocked [{}] {}",
                    operation.as_str(),
                    reason.as_str(),
                    message
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use disksim_core::DiskManager;

    use crate::script::{parse_line, run_step};

    fn respond(manager: &mut DiskManager, line: &str) -> Response {
        let step = parse_line(line).unwrap().unwrap();
        run_step(manager, &step)
    }

    #[test]
    fn region_table_groups_logical_drives_under_extended() {
        let manager = DiskManager::default();
        let table = region_table(&manager.snapshot());
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("p1 "));
        assert!(lines[1].contains("122,880"));
        assert!(lines[1].contains("Healthy"));
        assert!(lines[2].starts_with("ext1"));
        assert!(lines[3].starts_with("  p2"));
        assert!(lines[4].starts_with("unallocated-1"));
        assert_eq!(lines[5], "Disk: 500 GB (512,000 MB)");
    }

    #[test]
    fn applied_commands_show_the_new_layout() {
        let mut manager = DiskManager::default();
        let out = text(&respond(&mut manager, "shrink C: 20GB"));
        assert!(out.starts_with("Partition \"C:\" shrunk by"));
        assert!(out.ends_with("C: 100 GB | Free 20 GB | Extended 200 GB {D: 200 GB} | Free 180 GB"));
    }

    #[test]
    fn rejections_name_their_reason() {
        let mut manager = DiskManager::default();
        let out = text(&respond(&mut manager, "extend D: 1GB"));
        assert!(out.starts_with("rejected [no_adjacent_unallocated]"));
    }

    #[test]
    fn capabilities_list_blocked_operations() {
        let mut manager = DiskManager::default();
        let out = text(&respond(&mut manager, "caps Extended"));
        assert!(out.starts_with("Extended:"));
        assert!(out.contains("delete      blocked [extended_partition_occupied]"));
        assert!(!out.contains("rename"));
    }

    #[test]
    fn summary_reports_free_space() {
        let mut manager = DiskManager::default();
        let out = text(&respond(&mut manager, "summary"));
        assert!(out.contains("Unallocated:  180 GB (184,320 MB) (36.0%)"));
        assert!(out.contains("1 primary, 1 logical"));
    }

    #[test]
    fn json_output_is_tagged() {
        let mut manager = DiskManager::default();
        let out = json(&respond(&mut manager, "list")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["result"], "regions");
        assert_eq!(value["total_mb"], 512_000);
    }
}
