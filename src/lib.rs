//! # audio-delivery
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time delivery of a producer's stereo PCM stream to an output device.
//!
//! `audio-delivery` takes interleaved 16-bit stereo frames from a producer
//! (typically an emulation core), hands them to an audio device through a
//! small ring of fixed-size slots, and can mirror the same stream into a
//! WAV file. The producer is paced by the device: when it runs ahead,
//! [`DeliveryEngine::ingest()`] blocks until the device has played a slot,
//! which keeps end-to-end latency bounded by the ring size.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use audio_delivery::DeliveryEngine;
//!
//! let mut engine = DeliveryEngine::cpal();
//!
//! // Index into this list selects the device
//! println!("{:?}", engine.enumerate_devices()?);
//!
//! // Device 0, 44.1kHz, 100ms latency, 4 hardware and 3 software periods
//! engine.configure(Some(0), 44_100.0, 0.1, 4, 3)?;
//! engine.set_output_file("capture.wav")?;
//!
//! loop {
//!     let frame: Vec<i16> = run_one_video_frame();
//!     engine.ingest(&frame, frame.len() / 2)?;
//! }
//! # fn run_one_video_frame() -> Vec<i16> { vec![0; 1470] }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Control thread**: configuration, capture and [`ingest()`] all run
//!   here, on whatever thread owns the engine
//! - **Slot ring**: `sw_periods` slots of one device period each, handed over
//!   with per-slot signals
//! - **Device callback**: plays the next ready slot, or silence, and never
//!   waits
//!
//! A slow capture file can stall the producer, but never the device.
//!
//! [`ingest()`]: DeliveryEngine::ingest

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod config;
mod engine;
mod error;
pub mod format;
mod pipeline;
pub mod platform;
mod sink;
mod stats;

pub use config::{
    Configuration, MAX_LATENCY, MAX_PERIODS, MAX_PERIOD_FRAMES, MAX_SAMPLE_RATE, MIN_LATENCY,
    MIN_PERIODS, MIN_PERIOD_FRAMES, MIN_SAMPLE_RATE, PRODUCER_TIMEOUT,
};
pub use engine::DeliveryEngine;
pub use error::{CaptureError, DeviceError, EngineError};
pub use pipeline::SlotReader;
pub use platform::{
    AudioHost, CpalHost, Endpoint, MockDevice, MockEndpoint, MockHost, MockStream, OutputStream,
    StreamParams,
};
pub use sink::{CaptureSink, CaptureTarget};
pub use stats::DeliveryStats;
