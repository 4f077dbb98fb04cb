//! Redundant history reclamation command.

use super::open_store;
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use vdoc_core::ReclaimConfig;

/// Scan for redundant history files, deleting them with `delete`.
///
/// Findings never fail the command; only errors opening or walking the
/// store do.
pub fn run(root: &Path, namespace: Option<String>, delete: bool, quiet: bool) -> Result<()> {
    let store = open_store(root)?;
    let config = ReclaimConfig { namespace, delete };

    if !quiet {
        let scope = config.namespace.as_deref().unwrap_or("all namespaces");
        if delete {
            println!("{} Reclaiming redundant history in {}...", style("→").yellow(), scope);
        } else {
            println!(
                "{} Scanning {} (report only, nothing will be deleted)...",
                style("→").cyan(),
                scope
            );
        }
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:20} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("█▓▒░  "),
    );

    let pb_clone = pb.clone();
    let progress = move |current: usize, total: usize, phase: &str| {
        pb_clone.set_length(total as u64);
        pb_clone.set_position(current as u64);
        pb_clone.set_message(format!("Phase: {}", phase));
    };
    let report = store.reclaim(&config, Some(&progress))?;

    pb.finish_and_clear();

    if quiet {
        for error in &report.errors {
            eprintln!("error: {}", error);
        }
        return Ok(());
    }

    println!();
    println!("{}", style("Reclaim Report:").bold());
    println!("  Objects scanned:   {}", style(report.objects_scanned).cyan());
    println!("  With history:      {}", style(report.histories_scanned).cyan());
    println!(
        "  Redundant:         {}",
        if report.redundant.is_empty() {
            style(report.redundant.len()).green()
        } else {
            style(report.redundant.len()).yellow()
        }
    );
    println!(
        "  Reclaimable:       {} ({:.2} KB)",
        style(report.bytes_reclaimable).cyan(),
        report.bytes_reclaimable as f64 / 1024.0
    );

    for redundant in &report.redundant {
        println!("    {} {}", style("-").dim(), redundant.path.display());
    }

    if !report.mismatches.is_empty() {
        println!();
        println!("{}", style("Version mismatches (repaired on next save):").yellow().bold());
        for mismatch in &report.mismatches {
            println!(
                "  {} {}: embedded r{}, history r{}",
                style("!").yellow(),
                mismatch.locator,
                mismatch.embedded,
                mismatch.head
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", style("Errors encountered:").red().bold());
        for error in &report.errors {
            println!("  {} {}", style("×").red(), error);
        }
    }

    if !delete && !report.redundant.is_empty() {
        println!();
        println!("This was a report only. To delete the files, run:");
        println!("  {}", style("vdoc reclaim --delete").cyan());
    } else if report.files_deleted > 0 {
        println!();
        println!(
            "{} Deleted {} files, freed {:.2} KB",
            style("✓").green(),
            report.files_deleted,
            report.bytes_freed as f64 / 1024.0
        );
    }

    Ok(())
}
