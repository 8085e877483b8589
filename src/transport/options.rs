//! Stream parameters.
//!
//! Describes the stream the client asks the rendering server for and
//! renders it as relay URL query parameters.
//!
//! # Example
//!
//! ```ignore
//! use stream_remote::StreamOptions;
//!
//! let options = StreamOptions::new("render-host")
//!     .with_resolution(1280, 720)
//!     .with_fps(30);
//!
//! let url = options.relay_url("ws://render-host:8011/stream")?;
//! // ws://render-host:8011/stream?server=render-host&resolution=1280%3A720&fps=30&...
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default stream width in pixels.
pub const DEFAULT_WIDTH: u32 = 1920;

/// Default stream height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Default stream frame rate.
pub const DEFAULT_FPS: u32 = 60;

// ============================================================================
// CursorMode
// ============================================================================

/// How the remote cursor is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorMode {
    /// Cursor moves freely over the stream.
    #[default]
    Free,
    /// Cursor is captured by the stream.
    Locked,
}

impl CursorMode {
    /// Returns the query parameter value.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Locked => "locked",
        }
    }
}

// ============================================================================
// StreamOptions
// ============================================================================

/// Streaming session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Rendering server host.
    pub server: String,

    /// Frame size in pixels (width, height).
    pub resolution: (u32, u32),

    /// Target frame rate.
    pub fps: u32,

    /// Forward the local microphone.
    pub mic: bool,

    /// Cursor handling.
    pub cursor: CursorMode,

    /// Start the remote application automatically.
    pub autolaunch: bool,

    /// Additional query parameters.
    pub extra_params: Vec<(String, String)>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new("localhost")
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl StreamOptions {
    /// Creates options for `server` with default stream parameters.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            resolution: (DEFAULT_WIDTH, DEFAULT_HEIGHT),
            fps: DEFAULT_FPS,
            mic: false,
            cursor: CursorMode::Free,
            autolaunch: true,
            extra_params: Vec::new(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl StreamOptions {
    /// Sets the frame size.
    #[inline]
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    /// Sets the frame rate.
    #[inline]
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Enables microphone forwarding.
    #[inline]
    #[must_use]
    pub fn with_mic(mut self) -> Self {
        self.mic = true;
        self
    }

    /// Sets cursor handling.
    #[inline]
    #[must_use]
    pub fn with_cursor(mut self, cursor: CursorMode) -> Self {
        self.cursor = cursor;
        self
    }

    /// Disables automatic application launch.
    #[inline]
    #[must_use]
    pub fn without_autolaunch(mut self) -> Self {
        self.autolaunch = false;
        self
    }

    /// Adds a custom query parameter.
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl StreamOptions {
    /// Checks the parameters for values the server cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty server, zero dimensions, or
    /// zero frame rate.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config("stream server must not be empty"));
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(Error::config(format!(
                "invalid stream resolution {}x{}",
                self.resolution.0, self.resolution.1
            )));
        }
        if self.fps == 0 {
            return Err(Error::config("stream fps must be positive"));
        }
        Ok(())
    }

    /// Returns the query parameters in order.
    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let (width, height) = self.resolution;
        let mut params = vec![
            ("server".to_string(), self.server.clone()),
            ("resolution".to_string(), format!("{width}:{height}")),
            ("fps".to_string(), self.fps.to_string()),
            ("mic".to_string(), u8::from(self.mic).to_string()),
            ("cursor".to_string(), self.cursor.as_str().to_string()),
            ("autolaunch".to_string(), self.autolaunch.to_string()),
        ];
        params.extend(self.extra_params.iter().cloned());
        params
    }

    /// Appends the parameters to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base` does not parse, or [`Error::Config`]
    /// if the options are invalid.
    pub fn relay_url(&self, base: &str) -> Result<Url> {
        self.validate()?;
        let mut url = Url::parse(base)?;
        url.query_pairs_mut().extend_pairs(self.to_params());
        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StreamOptions::new("render-host");
        assert_eq!(options.resolution, (1920, 1080));
        assert_eq!(options.fps, 60);
        assert!(!options.mic);
        assert!(options.autolaunch);
        assert_eq!(options.cursor, CursorMode::Free);
    }

    #[test]
    fn test_params_order_and_values() {
        let params = StreamOptions::new("render-host").to_params();
        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["server", "resolution", "fps", "mic", "cursor", "autolaunch"]
        );
        assert_eq!(params[1].1, "1920:1080");
        assert_eq!(params[3].1, "0");
        assert_eq!(params[5].1, "true");
    }

    #[test]
    fn test_relay_url_round_trips_params() {
        let url = StreamOptions::new("render-host")
            .with_resolution(1280, 720)
            .with_fps(30)
            .with_param("session", "abc")
            .relay_url("ws://render-host:8011/stream")
            .expect("url");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("resolution".into(), "1280:720".into())));
        assert!(pairs.contains(&("fps".into(), "30".into())));
        assert!(pairs.contains(&("session".into(), "abc".into())));
        assert_eq!(url.host_str(), Some("render-host"));
    }

    #[test]
    fn test_validate() {
        assert!(StreamOptions::new(" ").validate().is_err());
        assert!(StreamOptions::new("h").with_resolution(0, 10).validate().is_err());
        assert!(StreamOptions::new("h").with_fps(0).validate().is_err());
        assert!(StreamOptions::new("h").validate().is_ok());
    }

    #[test]
    fn test_bad_base_url() {
        let err = StreamOptions::new("h").relay_url("not a url").expect_err("bad");
        assert!(matches!(err, Error::Url(_)));
    }
}
