//! # octoprobe-rs
//!
//! Host-side controller for a microcontroller-based 8-channel digital logic
//! analyzer. The device speaks a newline-terminated ASCII protocol over a
//! serial link; this library drives captures, decodes the hex-encoded sample
//! stream, and turns the captured channels into renderable digital waveforms
//! with pan and zoom.
//!
//! ## Features
//!
//! - **Port discovery and connection**: uses `serialport` to find and open
//!   the analyzer's UART
//! - **Protocol client**: sentinel-terminated request/response exchanges with
//!   bounded read timeouts
//! - **Capture orchestration**: arm, bounded readiness polling, fetch, with a
//!   Busy-rejecting state machine
//! - **Sample decoding**: lenient hex decoding that survives line noise
//! - **Waveform viewport**: zoom/offset window mapping and per-channel
//!   transition traces for any drawing surface
//!
//! ## Example
//!
//! ```rust,no_run
//! use octoprobe_rs::{AnalyzerConnector, CaptureController, Edge, WaveformViewport};
//!
//! // Open the first USB serial port and drive a capture.
//! let link = AnalyzerConnector::connect(None, None)?;
//! let mut analyzer = CaptureController::new(link);
//!
//! analyzer.set_sample_rate(71, 9)?; // 72 MHz / 72 / 10 = 100 kHz
//! analyzer.set_sample_count(1024)?;
//! analyzer.set_trigger(0, Edge::Rising)?;
//!
//! let samples = analyzer.run_capture()?;
//! println!("captured {} samples", samples.len());
//!
//! // Map the buffer onto an 800-unit-wide canvas, zoomed into the middle.
//! let mut viewport = WaveformViewport::new();
//! viewport.set_zoom(2.0);
//! viewport.set_offset(0.5);
//! for trace in viewport.render(&samples, 800.0) {
//!     println!("channel {}: {} transitions", trace.channel, trace.points.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The capture sequence is synchronous with bounded per-read timeouts; run
//! it on a worker thread to keep an interface responsive. Only one capture
//! may be in flight; a second request is rejected with
//! [`CaptureError::Busy`] rather than queued.

pub mod capture;
pub mod connector;
pub mod decoder;
pub mod link;
pub mod viewport;

// Re-export the main types for convenience
pub use capture::{
    format_sample_rate, sample_rate_hz, CaptureConfig, CaptureController, CaptureError,
    CaptureState, PollPolicy, Trigger, BASE_CLOCK_HZ,
};

pub use connector::{AnalyzerConnector, AnalyzerPort, ConnectorError, DEFAULT_BAUD};

pub use link::{Command, CommError, Edge, LinkOptions, ResponseBatch, SerialLink, Transport};

pub use viewport::{ChannelTrace, Level, TracePoint, WaveformViewport, CHANNEL_COUNT};
