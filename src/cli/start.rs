//! Development mode: build, serve and rebuild on change
//!
//! The watch loop is single-flight. While a cycle runs, new change batches
//! queue up in the watcher's channel; the next cycle drains all of them and
//! runs each affected builder once.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::build::report_cycle;
use super::output::Output;
use super::serve::start_server;
use crate::pipeline::{Pipeline, SourceWatcher, TriggerMap};
use crate::storage::Project;

/// Runs the full pipeline, then serves and watches until killed
pub fn start(output: &Output, port: Option<u16>, no_serve: bool) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("start", &format!("Project root: {}", project.root().display()));

    let mut pipeline = Pipeline::new(&project);

    output.log("Starting full build");
    let started = Instant::now();
    let report = pipeline.full_build().context("Build failed")?;
    report_cycle(output, &project, &pipeline, &report, started.elapsed());

    let server = if no_serve {
        None
    } else {
        Some(start_server(output, &project, port)?)
    };

    let result = watch_loop(output, &project, &mut pipeline);

    if let Some(server) = server {
        server.shutdown();
    }
    result
}

fn watch_loop(output: &Output, project: &Project, pipeline: &mut Pipeline) -> Result<()> {
    let debounce_ms = project.config().project.watch.debounce_ms;
    let watcher = SourceWatcher::new(TriggerMap::new(project), Duration::from_millis(debounce_ms))
        .context("Failed to start file watcher")?;

    for dir in watcher.watched() {
        output.log(&format!("Watching {}", project.display_path(dir)));
    }
    output.verbose_ctx("watch", &format!("Debounce: {} ms", debounce_ms));

    while let Some(cycle) = watcher.next_cycle() {
        for error in &cycle.errors {
            output.error(&format!("Watch error: {}", error));
        }
        if cycle.classes.is_empty() {
            continue;
        }

        let names: Vec<&str> = cycle.classes.iter().map(|c| c.as_str()).collect();
        output.log(&format!(
            "Detected {} change(s), rebuilding {}",
            cycle.changes,
            names.join(", ")
        ));

        let started = Instant::now();
        let report = pipeline.rebuild(&cycle.classes).context("Rebuild failed")?;
        report_cycle(output, project, pipeline, &report, started.elapsed());
    }

    output.verbose_ctx("watch", "Watcher closed");
    Ok(())
}
