//! Text reports for `scopetrace inspect`

use std::io::{self, Write};

use crate::analysis::BlockStats;
use crate::domain::BlockType;
use crate::loader::LoadedProfile;

/// Headline counts for a loaded profile
///
/// # Errors
/// Returns any error from `out`
pub fn write_summary<W: Write>(out: &mut W, profile: &LoadedProfile) -> io::Result<()> {
    if let Some(source) = profile.source() {
        writeln!(out, "profile: {}", source.display())?;
    }
    writeln!(out, "descriptors: {}", profile.descriptors().len())?;
    writeln!(out, "blocks: {}", profile.blocks().len())?;
    writeln!(out, "threads: {}", profile.trees().len())?;
    if let Some((begin, end)) = profile.time_range() {
        writeln!(out, "span: {}", end.since(begin))?;
    }
    Ok(())
}

/// Statistics table, `top` rows at most (0 = all)
///
/// # Errors
/// Returns any error from `out`
pub fn write_stats<W: Write>(out: &mut W, stats: &[BlockStats], top: usize) -> io::Result<()> {
    let rows = if top == 0 { stats.len() } else { top.min(stats.len()) };
    writeln!(
        out,
        "{:<28} {:>8} {:>11} {:>11} {:>11} {:>11} {:>7}",
        "BLOCK", "COUNT", "TOTAL", "SELF", "MIN", "MAX", "SHARE"
    )?;
    for s in &stats[..rows] {
        let name = match s.block_type {
            BlockType::Block => s.name.clone(),
            BlockType::Event => format!("{} (event)", s.name),
        };
        writeln!(
            out,
            "{:<28} {:>8} {:>11} {:>11} {:>11} {:>11} {:>6.1}%",
            truncate(&name, 28),
            s.count,
            s.total.to_string(),
            s.self_time.to_string(),
            s.min.to_string(),
            s.max.to_string(),
            s.percentage
        )?;
    }
    if rows < stats.len() {
        writeln!(out, "... {} more", stats.len() - rows)?;
    }
    Ok(())
}

/// Per-thread call trees down to `max_depth` levels
///
/// # Errors
/// Returns any error from `out`
pub fn write_trees<W: Write>(out: &mut W, profile: &LoadedProfile, max_depth: usize) -> io::Result<()> {
    for (thread, roots) in profile.trees() {
        writeln!(out, "{thread} ({} roots)", roots.len())?;
        for root in roots {
            for (depth, node) in root.walk().filter(|(depth, _)| *depth < max_depth) {
                let indent = "  ".repeat(depth + 1);
                let name = profile.block_name(&node.block);
                match node.block.block_type {
                    BlockType::Block => writeln!(
                        out,
                        "{indent}{name} {} (self {})",
                        node.duration(),
                        node.self_duration()
                    )?,
                    BlockType::Event => writeln!(out, "{indent}* {name}")?,
                }
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}
