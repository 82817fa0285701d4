//! Static file server for the output directory
//!
//! Runs on its own thread and reads every response from disk at request
//! time, so rebuilt artifacts are served without a restart.

use std::fs;
use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, StatusCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },
}

/// Handle to a running server
pub struct Server {
    http: Arc<tiny_http::Server>,
    addr: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds `address` and serves `root` on a background thread
    pub fn start(address: &str, root: PathBuf) -> Result<Self, ServerError> {
        let http = tiny_http::Server::http(address).map_err(|e| ServerError::Bind {
            address: address.to_string(),
            message: e.to_string(),
        })?;
        let http = Arc::new(http);
        let addr = http.server_addr().to_ip();

        let worker_http = Arc::clone(&http);
        let worker = thread::spawn(move || {
            for request in worker_http.incoming_requests() {
                handle(request, &root);
            }
        });

        Ok(Self {
            http,
            addr,
            worker: Some(worker),
        })
    }

    /// Bound address (useful when binding port 0)
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Blocks until the server thread exits
    pub fn wait(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Stops accepting requests and joins the server thread
    pub fn shutdown(mut self) {
        self.http.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.http.unblock();
        }
    }
}

fn handle(request: Request, root: &Path) {
    let response = match request.method() {
        Method::Get | Method::Head => respond_file(root, request.url()),
        _ => with_header(text_response(405, "Method Not Allowed"), "Allow", "GET, HEAD"),
    };
    // The client may already be gone
    let _ = request.respond(response);
}

fn respond_file(root: &Path, url: &str) -> Response<Cursor<Vec<u8>>> {
    let path = match resolve_request_path(root, url) {
        Ok(path) => path,
        Err(status) => return text_response(status, reason(status)),
    };

    match fs::read(&path) {
        Ok(bytes) => with_header(Response::from_data(bytes), "Content-Type", &content_type(&path)),
        Err(_) => text_response(404, "Not Found"),
    }
}

/// Maps a request URL onto a file below `root`
///
/// Query strings and fragments are ignored, `%XX` escapes are decoded and
/// directories resolve to their `index.html`. A `..` segment is refused
/// with 403.
pub(crate) fn resolve_request_path(root: &Path, url: &str) -> Result<PathBuf, u16> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let decoded = percent_decode_str(path).decode_utf8().map_err(|_| 400u16)?;

    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(403),
            Component::RootDir | Component::Prefix(_) => return Err(403),
        }
    }

    if resolved.is_dir() {
        resolved.push("index.html");
    }
    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(404)
    }
}

fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let essence = mime.essence_str();
    if mime.type_() == mime_guess::mime::TEXT
        || essence == "application/javascript"
        || essence == "application/json"
    {
        format!("{}; charset=utf-8", essence)
    } else {
        essence.to_string()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        403 => "Forbidden",
        _ => "Not Found",
    }
}

fn text_response(status: u16, body: &str) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_data(body.as_bytes().to_vec()).with_status_code(StatusCode(status));
    with_header(response, "Content-Type", "text/plain; charset=utf-8")
}

fn with_header<R: Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
