//! Audio pipeline components.
//!
//! The pipeline connects the producer to the output device through a ring
//! of fixed-size slots:
//!
//! ```text
//! ingest() → SlotWriter → [slot ring] → SlotReader → device callback
//! ```
//!
//! - **Slot ring**: `sw_periods` slots of one device period each, handed
//!   back and forth with per-slot signals
//! - **Backend**: the open platform stream plus the producer half of its ring
//! - **Staging**: one slot of look-ahead for devices whose callback size
//!   differs from the slot size
//!
//! The callback never waits on the producer; a slot that is not ready plays
//! as silence.

mod backend;
mod ring;
mod staging;

pub(crate) use backend::RealtimeBackend;
pub use ring::SlotReader;
pub(crate) use ring::{slot_ring, SlotWriter};
pub(crate) use staging::StagedReader;
