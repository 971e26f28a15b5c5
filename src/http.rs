//! HTTP adapter over the capture contract
//!
//! Routes:
//!
//! - `GET /screenshot[?page=N]` returns the BMP (`image/bmp`, `no-cache`)
//! - `GET /screenshot/info` returns [`DisplayInfo`](crate::DisplayInfo) as JSON
//!
//! Requests are handled one at a time on the thread that calls
//! [`HttpServer::run`].

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, warn};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use url::Url;

use crate::{CaptureResult, Coordinator, Error, Result, ViewSelector};

/// Response body produced by [`route`].
#[derive(Debug, Clone)]
pub enum Body {
    /// A captured image, served straight from the shared buffer.
    Image(Arc<CaptureResult>),
    Text(String),
    Json(String),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Body,
}

impl Reply {
    fn text(status: u16, message: &str) -> Self {
        Reply {
            status,
            body: Body::Text(message.to_string()),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.body {
            Body::Image(_) => "image/bmp",
            Body::Text(_) => "text/plain",
            Body::Json(_) => "application/json",
        }
    }
}

// Request targets arrive as origin-form paths; resolve them against a dummy origin.
const REQUEST_BASE: &str = "http://localhost/";

/// Bytes of an `Arc<CaptureResult>` readable through `std::io::Read`.
struct ImageBytes(Arc<CaptureResult>);

impl AsRef<[u8]> for ImageBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Page selector from a query string. Missing, negative or unparsable values
/// mean "the current page".
pub fn page_param(query: &str) -> Option<ViewSelector> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.trim().parse::<i64>().ok())
        .and_then(|page| ViewSelector::try_from(page).ok())
}

/// Map one request onto the capture contract.
pub fn route(coordinator: &Coordinator, method: &Method, url: &str) -> Reply {
    if *method != Method::Get {
        return Reply::text(404, "Not Found");
    }
    let Ok(parsed) = Url::parse(REQUEST_BASE).and_then(|base| base.join(url)) else {
        return Reply::text(404, "Not Found");
    };
    let query = parsed.query().unwrap_or("");

    match parsed.path() {
        "/screenshot" => match coordinator.request_capture(page_param(query)) {
            Ok(image) => Reply {
                status: 200,
                body: Body::Image(image),
            },
            Err(Error::Timeout(_)) => Reply::text(504, "Screenshot capture timed out"),
            Err(Error::Busy) => Reply::text(503, "Screenshot capture already in progress"),
            Err(e) => {
                warn!("{}", e);
                Reply::text(500, "Failed to capture screenshot")
            }
        },
        "/screenshot/info" => match serde_json::to_string(coordinator.info()) {
            Ok(json) => Reply {
                status: 200,
                body: Body::Json(json),
            },
            Err(e) => Reply::text(500, &e.to_string()),
        },
        _ => Reply::text(404, "Not Found"),
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Blocking HTTP server bound to a local address.
pub struct HttpServer {
    server: Arc<Server>,
}

impl HttpServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| Error::Other(format!("cannot bind {}: {}", addr, e)))?;
        Ok(Self {
            server: Arc::new(server),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Handle requests until [`unblock`](Self::unblock) is called.
    pub fn run(&self, coordinator: &Coordinator) {
        for request in self.server.incoming_requests() {
            respond(coordinator, request);
        }
    }

    /// Make a concurrent [`run`](Self::run) return.
    pub fn unblock(&self) {
        self.server.unblock();
    }

    /// A second handle to the same listener, e.g. to stop it from another
    /// thread.
    pub fn handle(&self) -> HttpServer {
        HttpServer {
            server: self.server.clone(),
        }
    }
}

fn respond(coordinator: &Coordinator, request: Request) {
    let reply = route(coordinator, request.method(), request.url());
    debug!("{} {} -> {}", request.method(), request.url(), reply.status);

    let mut headers: Vec<Header> = header("Content-Type", reply.content_type())
        .into_iter()
        .collect();
    let sent = match reply.body {
        Body::Image(image) => {
            headers.extend(header("Cache-Control", "no-cache"));
            let len = image.len();
            let response = Response::new(
                StatusCode(reply.status),
                headers,
                Cursor::new(ImageBytes(image)),
                Some(len),
                None,
            );
            request.respond(response)
        }
        Body::Text(body) | Body::Json(body) => {
            let mut response = Response::from_string(body).with_status_code(reply.status);
            for h in headers {
                response.add_header(h);
            }
            request.respond(response)
        }
    };
    if let Err(e) = sent {
        warn!("Failed to send response: {}", e);
    }
}
