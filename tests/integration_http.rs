#![cfg(feature = "http")]

use std::thread;

use display_capture::http::HttpServer;
use display_capture::platform::{MemoryDisplay, PageMode};
use display_capture::rendering::raster::BmpHeader;
use display_capture::rendering::Rotation;
use display_capture::{CaptureConfig, CaptureService, Coordinator, DisplayInfo};

/// Start the adapter on an ephemeral port; returns the base URL and a stop handle.
fn start_server(coordinator: Coordinator) -> (String, HttpServer) {
    let server = HttpServer::bind("127.0.0.1:0").expect("bind");
    let addr = server.local_addr().expect("ip listener");
    let stop = server.handle();
    thread::spawn(move || server.run(&coordinator));
    (format!("http://{}", addr), stop)
}

fn native_service(timeout_ms: u64) -> CaptureService<MemoryDisplay> {
    let display = MemoryDisplay::with_displayed_size(320, 240, Rotation::Deg0).with_active_page(Some(0));
    CaptureService::new(
        display,
        PageMode::NativePages(vec![0, 1, 2]),
        CaptureConfig {
            timeout_ms,
            tick_interval_ms: 1,
            page_names: vec!["Main".into(), "Graph".into(), "Settings".into()],
            ..CaptureConfig::default()
        },
    )
    .expect("service")
}

#[test]
fn screenshot_endpoint_serves_bmp() {
    let service = native_service(2000);
    let (base, stop) = start_server(service.coordinator());
    let owner = service.spawn().unwrap();

    let resp = reqwest::blocking::get(format!("{base}/screenshot?page=1")).expect("request");
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "image/bmp");
    assert_eq!(resp.headers()["cache-control"], "no-cache");
    let body = resp.bytes().unwrap();
    assert_eq!(body.len(), 230_454);
    let header = BmpHeader::parse(&body).unwrap();
    assert_eq!((header.width, header.height), (320, 240));

    owner.shutdown().unwrap();
    stop.unblock();
}

#[test]
fn info_endpoint_serves_metadata() {
    let service = native_service(2000);
    let (base, stop) = start_server(service.coordinator());

    let resp = reqwest::blocking::get(format!("{base}/screenshot/info")).expect("request");
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let info: DisplayInfo = serde_json::from_str(&resp.text().unwrap()).unwrap();
    assert_eq!(info.pages, Some(3));
    assert_eq!(info.mode, "native_pages");
    assert_eq!(info.page_names, vec!["Main", "Graph", "Settings"]);

    drop(service);
    stop.unblock();
}

#[test]
fn stalled_owner_yields_gateway_timeout() {
    let service = native_service(100);
    let (base, stop) = start_server(service.coordinator());

    let resp = reqwest::blocking::get(format!("{base}/screenshot")).expect("request");
    assert_eq!(resp.status().as_u16(), 504);
    assert_eq!(resp.text().unwrap(), "Screenshot capture timed out");

    let resp = reqwest::blocking::get(format!("{base}/nope")).expect("request");
    assert_eq!(resp.status().as_u16(), 404);

    drop(service);
    stop.unblock();
}

#[test]
fn failed_capture_yields_server_error() {
    let display = MemoryDisplay::with_displayed_size(320, 240, Rotation::Deg0);
    let service = CaptureService::new(
        display,
        PageMode::Single,
        CaptureConfig {
            max_image_bytes: Some(1000),
            tick_interval_ms: 1,
            ..CaptureConfig::default()
        },
    )
    .unwrap();
    let (base, stop) = start_server(service.coordinator());
    let owner = service.spawn().unwrap();

    let resp = reqwest::blocking::get(format!("{base}/screenshot")).expect("request");
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(resp.text().unwrap(), "Failed to capture screenshot");

    owner.shutdown().unwrap();
    stop.unblock();
}
