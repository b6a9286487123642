// SPDX-License-Identifier: GPL-3.0-only

//! Line-oriented command scripts
//!
//! One command per line, `#` starts a comment line:
//!
//! ```text
//! create E: 50GB primary --fs exFAT
//! create - 20GB logical --in free-3
//! shrink C: 20GB left
//! extend C: 20GB
//! delete Extended
//! format D: FAT32
//! rename D: "Data Disk"
//! drag C: right 300 350
//! list | summary | caps <ref> | reset
//! ```
//!
//! A line starting with `{` is read as a JSON encoded command.

use std::collections::VecDeque;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use disksim_core::{Command, CreateRequest, DiskManager};
use disksim_types::{
    Capabilities, DiskError, DiskSummary, FileSystem, Outcome, PartitionType, Side, Snapshot,
    parse_size,
};

/// A parsed script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Apply(Command),
    Drag {
        target: String,
        side: Side,
        from_px: f64,
        to_px: f64,
    },
    List,
    Summary,
    Capabilities {
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub number: usize,
    pub text: String,
    pub step: Step,
}

/// What a step produced. Rejections are results, not failures of the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Applied(Outcome),
    Unchanged {
        message: String,
    },
    Regions(Snapshot),
    Summary(DiskSummary),
    Capabilities {
        target: String,
        capabilities: Capabilities,
    },
    Rejected(DiskError),
}

impl Response {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Parse a whole script up front so that a typo on line 40 fails before
/// line 1 runs.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        let step = parse_line(text).with_context(|| format!("line {number}: {}", text.trim()))?;
        if let Some(step) = step {
            lines.push(ScriptLine {
                number,
                text: text.trim().to_string(),
                step,
            });
        }
    }
    Ok(lines)
}

/// Parse one line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Step>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        let command: Command = serde_json::from_str(line).context("Invalid JSON command")?;
        return Ok(Some(Step::Apply(command)));
    }

    let mut words: VecDeque<String> = tokenize(line)?.into();
    let Some(verb) = words.pop_front() else {
        return Ok(None);
    };

    let step = match verb.to_ascii_lowercase().as_str() {
        "create" | "new" => parse_create(&mut words)?,
        "shrink" => {
            let target = required(&mut words, "partition")?;
            let amount_mb = take_size(&mut words)?;
            let side = optional_side(&mut words)?;
            Step::Apply(Command::Shrink {
                target,
                amount_mb,
                side,
            })
        }
        "extend" => {
            let target = required(&mut words, "partition")?;
            let amount_mb = take_size(&mut words)?;
            let side = optional_side(&mut words)?;
            Step::Apply(Command::Extend {
                target,
                amount_mb,
                side,
            })
        }
        "delete" | "rm" => Step::Apply(Command::Delete {
            target: required(&mut words, "partition")?,
        }),
        "format" => {
            let target = required(&mut words, "partition")?;
            let file_system = match words.pop_front() {
                Some(word) => Some(word.parse::<FileSystem>()?),
                None => None,
            };
            Step::Apply(Command::Format {
                target,
                file_system,
            })
        }
        "rename" => {
            let target = required(&mut words, "partition")?;
            let name = words.drain(..).collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                bail!("Missing new name");
            }
            Step::Apply(Command::Rename { target, name })
        }
        "drag" => {
            let target = required(&mut words, "partition")?;
            let side = required(&mut words, "side")?.parse::<Side>()?;
            let from_px = take_pixels(&mut words)?;
            let to_px = take_pixels(&mut words)?;
            Step::Drag {
                target,
                side,
                from_px,
                to_px,
            }
        }
        "list" | "ls" => Step::List,
        "summary" => Step::Summary,
        "caps" | "capabilities" => Step::Capabilities {
            target: required(&mut words, "region")?,
        },
        "reset" => Step::Apply(Command::Reset),
        other => bail!("Unknown command: {other}"),
    };

    if let Some(extra) = words.front() {
        bail!("Unexpected argument: {extra}");
    }
    Ok(Some(step))
}

/// Run one step against the session.
pub fn run_step(manager: &mut DiskManager, step: &Step) -> Response {
    match step {
        Step::Apply(command) => match manager.execute(command.clone()) {
            Ok(outcome) => Response::Applied(outcome),
            Err(error) => Response::Rejected(error),
        },
        Step::Drag {
            target,
            side,
            from_px,
            to_px,
        } => {
            if let Err(error) = manager.begin_drag(target, *side, *from_px) {
                return Response::Rejected(error);
            }
            manager.drag_to(*to_px);
            match manager.end_drag(*to_px) {
                Ok(Some(outcome)) => Response::Applied(outcome),
                Ok(None) => Response::Unchanged {
                    message: format!("Drag on \"{target}\" released without a size change"),
                },
                Err(error) => Response::Rejected(error),
            }
        }
        Step::List => Response::Regions(manager.snapshot()),
        Step::Summary => Response::Summary(manager.summary()),
        Step::Capabilities { target } => match manager.capabilities(target) {
            Ok(capabilities) => Response::Capabilities {
                target: target.clone(),
                capabilities,
            },
            Err(error) => Response::Rejected(error),
        },
    }
}

fn parse_create(words: &mut VecDeque<String>) -> Result<Step> {
    let name = required(words, "name (use - for the next drive letter)")?;
    let size_mb = take_size(words)?;
    let mut request = CreateRequest {
        name: (name != "-").then_some(name),
        size_mb,
        partition_type: PartitionType::Primary,
        target: None,
        file_system: None,
    };

    while let Some(word) = words.pop_front() {
        match word.as_str() {
            "--in" => request = request.in_gap(required(words, "gap id")?.as_str()),
            "--fs" => request = request.with_file_system(required(words, "file system")?.parse()?),
            other => request.partition_type = other.parse()?,
        }
    }
    Ok(Step::Apply(Command::Create(request)))
}

fn required(words: &mut VecDeque<String>, what: &str) -> Result<String> {
    words
        .pop_front()
        .with_context(|| format!("Missing {what}"))
}

/// A size is one word (`50GB`) or a number followed by its unit (`50 GB`).
fn take_size(words: &mut VecDeque<String>) -> Result<u64> {
    let mut text = required(words, "size")?;
    if let Some(next) = words.front()
        && is_unit(next)
    {
        text.push_str(next);
        words.pop_front();
    }
    parse_size(&text)
}

fn is_unit(word: &str) -> bool {
    matches!(word.to_ascii_uppercase().as_str(), "MB" | "M" | "GB" | "G")
}

fn optional_side(words: &mut VecDeque<String>) -> Result<Side> {
    match words.pop_front() {
        Some(word) => word.parse(),
        None => Ok(Side::Right),
    }
}

fn take_pixels(words: &mut VecDeque<String>) -> Result<f64> {
    let word = required(words, "pointer position")?;
    word.parse()
        .with_context(|| format!("Invalid pointer position: {word}"))
}

/// Split on whitespace, keeping double-quoted text together.
fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }

    if quoted {
        bail!("Unterminated quote");
    }
    if pending {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    use disksim_types::ErrorReason;

    fn step(line: &str) -> Step {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn create_lines_accept_flags_and_split_units() {
        let Step::Apply(Command::Create(request)) = step("create E: 50 GB primary --fs exfat")
        else {
            panic!("expected create");
        };
        assert_eq!(request.name.as_deref(), Some("E:"));
        assert_eq!(request.size_mb, 51200);
        assert_eq!(request.partition_type, PartitionType::Primary);
        assert_eq!(request.file_system, Some(FileSystem::ExFat));

        let Step::Apply(Command::Create(request)) = step("create - 2GB logical --in free-3")
        else {
            panic!("expected create");
        };
        assert_eq!(request.name, None);
        assert_eq!(request.partition_type, PartitionType::Logical);
        assert_eq!(request.target.as_ref().map(|id| id.as_str()), Some("free-3"));
    }

    #[test]
    fn resize_lines_default_to_the_right_edge() {
        assert_eq!(
            step("shrink C: 20480"),
            Step::Apply(Command::Shrink {
                target: "C:".to_string(),
                amount_mb: 20480,
                side: Side::Right,
            })
        );
        assert_eq!(
            step("extend C: 1GB left"),
            Step::Apply(Command::Extend {
                target: "C:".to_string(),
                amount_mb: 1024,
                side: Side::Left,
            })
        );
    }

    #[test]
    fn quoted_names_and_trailing_words() {
        assert_eq!(
            step("rename D: \"Data Disk\""),
            Step::Apply(Command::Rename {
                target: "D:".to_string(),
                name: "Data Disk".to_string(),
            })
        );
        assert_eq!(
            step("rename D: Data Disk"),
            Step::Apply(Command::Rename {
                target: "D:".to_string(),
                name: "Data Disk".to_string(),
            })
        );
        assert!(parse_line("rename D: \"oops").is_err());
    }

    #[test]
    fn json_lines_are_commands() {
        assert_eq!(
            step(r#"{"command": "delete", "target": "Extended"}"#),
            Step::Apply(Command::Delete {
                target: "Extended".to_string(),
            })
        );
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# shrink C: 1GB").unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse_line("explode C:").is_err());
        assert!(parse_line("shrink C:").is_err());
        assert!(parse_line("delete C: D:").is_err());
        assert!(parse_line("drag C: up 0 10").is_err());
        assert!(parse_line("format C: ext4").is_err());

        let error = parse_script("list\nshrink C: lots\n").unwrap_err();
        assert!(format!("{error:#}").starts_with("line 2: shrink C: lots"));
    }

    #[test]
    fn script_runs_the_walkthrough() {
        let script = parse_script(
            "# default layout\n\
             create E: 51200 primary\n\
             shrink C: 20480\n\
             extend C: 20480\n\
             delete Extended\n\
             list\n",
        )
        .unwrap();
        assert_eq!(script.len(), 5);
        assert_eq!(script[0].number, 2);

        let mut manager = DiskManager::default();
        let responses: Vec<Response> = script
            .iter()
            .map(|line| run_step(&mut manager, &line.step))
            .collect();

        assert!(matches!(responses[0], Response::Applied(_)));
        assert!(matches!(responses[2], Response::Applied(_)));
        let Response::Rejected(error) = &responses[3] else {
            panic!("deleting an occupied extended partition must fail");
        };
        assert_eq!(error.reason, ErrorReason::ExtendedPartitionOccupied);
        let Response::Regions(snapshot) = &responses[4] else {
            panic!("expected a listing");
        };
        assert_eq!(
            snapshot.layout_line(),
            "C: 120 GB | Extended 200 GB {D: 200 GB} | E: 50 GB | Free 130 GB"
        );
    }

    #[test]
    fn shipped_demo_rejects_only_the_occupied_delete() {
        let script = parse_script(include_str!("../../demos/walkthrough.txt")).unwrap();
        let mut manager = DiskManager::default();
        let rejected: Vec<&str> = script
            .iter()
            .filter(|line| run_step(&mut manager, &line.step).is_rejected())
            .map(|line| line.text.as_str())
            .collect();
        assert_eq!(rejected, vec!["delete Extended"]);
        assert_eq!(
            manager.snapshot().layout_line(),
            "C: 120 GB | Extended 200 GB {D: 200 GB} | Media 60 GB | Free 120 GB"
        );
    }

    #[test]
    fn drag_without_motion_is_unchanged() {
        let mut manager = DiskManager::default();
        let response = run_step(&mut manager, &step("drag C: right 100 100"));
        assert!(matches!(response, Response::Unchanged { .. }));
        assert!(!manager.is_dragging());

        let response = run_step(&mut manager, &step("drag unallocated-1 right 0 10"));
        assert!(response.is_rejected());
    }

    #[test]
    fn responses_serialize_with_a_result_tag() {
        let mut manager = DiskManager::default();
        let response = run_step(&mut manager, &step("delete nowhere"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["result"], "rejected");
        assert_eq!(json["reason"], "region_not_found");
    }
}
