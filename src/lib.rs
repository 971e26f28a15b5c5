//! Display Capture
//!
//! Remote screenshots of a framebuffer that only one execution context may
//! touch. A requester on another thread asks for a capture through a
//! [`Coordinator`]; the framebuffer owner services the request on its next
//! tick, optionally switching to another page first, and hands back an
//! uncompressed 24-bit BMP.
//!
//! # Features
//!
//! - **Single-owner handoff**: requests are serviced only from the owner's
//!   loop, bounded by a timeout on the requester side
//! - **Page modes**: single screen, native backend pages, or a page global
//! - **Rotation aware**: all four panel rotations map back to screen order
//! - **HTTP adapter** (`http` feature, default): `GET /screenshot[?page=N]`
//!
//! # Example
//!
//! ```no_run
//! use display_capture::platform::{MemoryDisplay, PageMode};
//! use display_capture::rendering::Rotation;
//! use display_capture::{CaptureConfig, CaptureService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let display = MemoryDisplay::with_displayed_size(320, 240, Rotation::Deg0)
//!     .with_active_page(Some(0));
//! let service = CaptureService::new(
//!     display,
//!     PageMode::NativePages(vec![0, 1, 2]),
//!     CaptureConfig::default(),
//! )?;
//! let coordinator = service.coordinator();
//! let owner = service.spawn()?;
//!
//! let image = coordinator.request_capture(Some(1))?;
//! assert_eq!(image.len(), 230_454);
//! owner.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod platform;
pub mod rendering;

// Async-friendly facade over the blocking coordinator
pub mod async_api;

// Transport adapter built on the public capture contract
#[cfg(feature = "http")]
pub mod http;

pub use async_api::AsyncCapture;
pub use capture::{CaptureResult, CaptureService, Coordinator, OwnerHandle};

/// Index of the page to capture.
pub type ViewSelector = usize;

/// Configuration for the capture service
///
/// The page mode itself is not part of this struct: it holds live backend
/// handles and is passed to [`CaptureService::new`] alongside it.
///
/// # Examples
///
/// ```
/// let cfg = display_capture::CaptureConfig::default();
/// assert_eq!(cfg.timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long a requester waits for the owner, in milliseconds
    pub timeout_ms: u64,
    /// Human-readable page names; in global-page mode also the page count
    pub page_names: Vec<String>,
    /// Largest encoded image the service may allocate (`None` = unbounded)
    pub max_image_bytes: Option<usize>,
    /// Tick period of a spawned owner thread, in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            page_names: Vec::new(),
            max_image_bytes: None,
            tick_interval_ms: 16,
        }
    }
}

impl CaptureConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CaptureConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::ConfigError("tick_interval_ms must be positive".into()));
        }
        if self.tick_interval_ms >= self.timeout_ms {
            return Err(Error::ConfigError(format!(
                "tick_interval_ms ({}) must be shorter than timeout_ms ({})",
                self.tick_interval_ms, self.timeout_ms
            )));
        }
        Ok(())
    }
}

/// Setup-time description of the display, suitable for an info endpoint
///
/// `pages` is omitted from JSON when unknown so clients can tell "unknown"
/// from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert!(config.page_names.is_empty());
        assert!(config.max_image_bytes.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config =
            CaptureConfig::from_json_str(r#"{"page_names":["Main","Graph"],"timeout_ms":250}"#)
                .unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.page_names, vec!["Main", "Graph"]);
        assert_eq!(config.tick_interval_ms, 16);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            CaptureConfig::from_json_str(r#"{"timeout_ms":0}"#),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            CaptureConfig::from_json_str(r#"{"timeout_ms":10,"tick_interval_ms":10}"#),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            CaptureConfig::from_json_str("not json"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_display_info_json_shape() {
        let info = DisplayInfo {
            width: 320,
            height: 240,
            pages: Some(3),
            mode: "native_pages".into(),
            page_names: vec!["Main".into(), "Graph\"1\"".into(), "Settings".into()],
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"width":320,"height":240,"pages":3,"mode":"native_pages","page_names":["Main","Graph\"1\"","Settings"]}"#
        );

        let unknown = DisplayInfo {
            pages: None,
            page_names: Vec::new(),
            mode: "global_pages".into(),
            ..info
        };
        assert_eq!(
            serde_json::to_string(&unknown).unwrap(),
            r#"{"width":320,"height":240,"mode":"global_pages"}"#
        );
    }
}
