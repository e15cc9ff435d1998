//! Human-readable report of a run.
//!
//! ```text
//! Duplicate Group #1 size 1.0 MiB (3 files)
//!   master          /data/a.iso
//!   linked          /data/b.iso
//!   skipped         /data/c.iso: on a different device than the master
//!
//! Summary: 1 group, 1 linked, 0 already linked, 1 skipped, 1.0 MiB reclaimed
//! ```

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::{Condition, Paint};

use crate::actions::{FileOutcome, GroupOutcome};
use crate::driver::RunReport;
use crate::duplicates::EquivalenceGroup;

/// Plain-text writer for a [`RunReport`].
#[derive(Debug)]
pub struct TextOutput<'a> {
    report: &'a RunReport,
    color: bool,
    dry_run: bool,
}

impl<'a> TextOutput<'a> {
    /// Create a writer for `report` with colors enabled.
    #[must_use]
    pub fn new(report: &'a RunReport) -> Self {
        Self {
            report,
            color: true,
            dry_run: false,
        }
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Word the summary for a dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn condition(&self) -> Condition {
        if self.color {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        }
    }

    /// Write the full report.
    ///
    /// # Errors
    ///
    /// Returns any error raised by `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let report = self.report;

        if report.groups.is_empty() {
            writeln!(writer, "No duplicate files found.")?;
        }

        for (index, group) in report.groups.iter().enumerate() {
            self.write_group(writer, index + 1, group, report.outcomes.get(index))?;
        }

        if !report.anomalies.is_empty() {
            writeln!(writer, "{}", "Warnings:".yellow().bold().whenever(self.condition()))?;
            for anomaly in &report.anomalies {
                writeln!(writer, "  {anomaly}")?;
            }
            writeln!(writer)?;
        }

        if let Some(ref fatal) = report.fatal {
            writeln!(
                writer,
                "{} {fatal}",
                "Aborted:".red().bold().whenever(self.condition())
            )?;
        }
        if report.interrupted {
            writeln!(
                writer,
                "{}",
                "Interrupted before all groups were processed."
                    .yellow()
                    .whenever(self.condition())
            )?;
        }

        self.write_summary(writer)
    }

    fn write_group<W: Write>(
        &self,
        writer: &mut W,
        number: usize,
        group: &EquivalenceGroup,
        outcome: Option<&GroupOutcome>,
    ) -> io::Result<()> {
        let header = format!(
            "Duplicate Group #{number} size {} ({} files)",
            ByteSize::b(group.size),
            group.len()
        );
        writeln!(writer, "{}", header.bold().whenever(self.condition()))?;

        if let Some(master) = group.master() {
            writeln!(writer, "  {:<15} {}", "master", master.display())?;
        }

        match outcome {
            Some(outcome) => {
                for file in &outcome.files {
                    self.write_file(writer, file)?;
                }
            }
            None => {
                for path in group.duplicates() {
                    writeln!(
                        writer,
                        "  {} {}",
                        label("not processed").dim().whenever(self.condition()),
                        path.display()
                    )?;
                }
            }
        }
        writeln!(writer)
    }

    fn write_file<W: Write>(&self, writer: &mut W, file: &FileOutcome) -> io::Result<()> {
        let path = file.path().display();
        match file {
            FileOutcome::Linked { .. } => writeln!(
                writer,
                "  {} {path}",
                label("linked").green().whenever(self.condition())
            ),
            FileOutcome::WouldLink { .. } => writeln!(
                writer,
                "  {} {path}",
                label("would link").cyan().whenever(self.condition())
            ),
            FileOutcome::AlreadyLinked { .. } => writeln!(
                writer,
                "  {} {path}",
                label("already linked").dim().whenever(self.condition())
            ),
            FileOutcome::Skipped { reason, .. } => writeln!(
                writer,
                "  {} {path}: {reason}",
                label("skipped").yellow().whenever(self.condition())
            ),
        }
    }

    fn write_summary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let report = self.report;
        let groups = report.groups.len();
        let (linked_label, reclaimed_label) = if self.dry_run {
            ("would be linked", "reclaimable")
        } else {
            ("linked", "reclaimed")
        };

        writeln!(
            writer,
            "{} {} group{}, {} {linked_label}, {} already linked, {} skipped, {} {reclaimed_label}",
            "Summary:".bold().whenever(self.condition()),
            groups,
            if groups == 1 { "" } else { "s" },
            report.linked_count(),
            report.already_linked_count(),
            report.skipped_count(),
            ByteSize::b(report.bytes_reclaimed())
        )?;
        writeln!(
            writer,
            "Scanned {} files ({}) in {:.2?}, {} skipped by errors, {} anomalies",
            report.scan.files,
            ByteSize::b(report.scan.bytes),
            report.durations.scan + report.durations.partition + report.durations.link,
            report.scan.errors,
            report.anomalies.len()
        )
    }
}

/// Status column, padded before any color codes are added.
fn label(text: &str) -> String {
    format!("{text:<15}")
}
