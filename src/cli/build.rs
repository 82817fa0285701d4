//! One-shot build and clean commands

use std::error::Error;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::output::Output;
use crate::pipeline::{self, BuildError, CycleReport, Pipeline};
use crate::storage::Project;

/// Cleans, builds everything once and exits
///
/// Builder failures don't stop the other steps but make the command fail
/// once every step has run.
pub fn build(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("build", &format!("Project root: {}", project.root().display()));

    let mut pipeline = Pipeline::new(&project);
    let started = Instant::now();
    let report = pipeline.full_build().context("Build failed")?;

    report_cycle(output, &project, &pipeline, &report, started.elapsed());

    if !report.is_clean() {
        anyhow::bail!("{} build step(s) failed", report.failures.len());
    }
    Ok(())
}

/// Empties the output directory
pub fn clean(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let out_dir = project.out_dir();

    pipeline::clean(&out_dir)
        .with_context(|| format!("Failed to clean {}", out_dir.display()))?;

    output.success(&format!("Cleaned {}", project.display_path(&out_dir)));
    Ok(())
}

/// Prints what a build cycle did
pub(crate) fn report_cycle(
    output: &Output,
    project: &Project,
    pipeline: &Pipeline,
    report: &CycleReport,
    elapsed: Duration,
) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "success": report.is_clean(),
            "classes": report.classes.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "pages": report.pages,
            "script": report.script.as_ref().map(|a| &a.rel_path),
            "style": report.style.as_ref().map(|a| &a.rel_path),
            "injected": report.injected,
            "modules": pipeline.bundle_stats(),
            "errors": report.failures.iter().map(describe).collect::<Vec<_>>(),
            "elapsed_ms": elapsed.as_millis() as u64,
        }));
        return;
    }

    if let Some(pages) = &report.pages {
        let mut line = format!("Copied {} page(s)", pages.copied);
        if pages.removed > 0 {
            line.push_str(&format!(", removed {}", pages.removed));
        }
        output.log(&line);
    }

    if let Some(script) = &report.script {
        match pipeline.bundle_stats() {
            Some(stats) => output.log(&format!(
                "Bundled {} ({} modules, {} cached)",
                script.rel_path, stats.modules, stats.reused
            )),
            None => output.log(&format!("Bundled {}", script.rel_path)),
        }
        if let Some(stats) = pipeline.bundle_stats() {
            for cycle in &stats.cycles {
                output.verbose_ctx("script", &format!("Import cycle: {}", cycle.join(" -> ")));
            }
        }
    }

    if let Some(style) = &report.style {
        output.log(&format!("Compiled {}", style.rel_path));
    }

    for failure in &report.failures {
        output.error(&describe(failure));
    }

    if report.injected > 0 {
        output.log(&format!("Injected assets into {} page(s)", report.injected));
    }

    output.verbose_ctx(
        "build",
        &format!(
            "Cycle finished in {} ms, output at {}",
            elapsed.as_millis(),
            project.display_path(pipeline.out_dir())
        ),
    );
}

/// Error message followed by its sources
fn describe(error: &BuildError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}
