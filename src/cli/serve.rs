//! Serve command

use anyhow::{Context, Result};

use super::output::Output;
use crate::pipeline::Server;
use crate::storage::Project;

/// Serves the existing output directory until the process is killed
pub fn serve(output: &Output, port: Option<u16>) -> Result<()> {
    let project = Project::open_current()?;
    let out_dir = project.out_dir();

    if !out_dir.is_dir() {
        anyhow::bail!(
            "Output directory {} does not exist. Run 'assetpipe build' first.",
            project.display_path(&out_dir)
        );
    }

    let server = start_server(output, &project, port)?;
    server.wait();
    Ok(())
}

/// Binds the configured address, with `port` overriding the config
pub(crate) fn start_server(output: &Output, project: &Project, port: Option<u16>) -> Result<Server> {
    let mut config = project.config().project.server.clone();
    if let Some(port) = port {
        config.port = port;
    }
    let address = config.address();

    let server = Server::start(&address, project.out_dir())
        .with_context(|| format!("Failed to start server on {}", address))?;

    let url = match server.addr() {
        Some(addr) => format!("http://{}", addr),
        None => format!("http://{}", address),
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "serving": project.display_path(&project.out_dir()),
            "url": url,
        }));
    } else {
        output.log(&format!("Serving {} at {}", project.display_path(&project.out_dir()), url));
    }
    Ok(server)
}
