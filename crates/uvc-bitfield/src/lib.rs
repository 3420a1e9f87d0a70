//! Bit-field codec for USB Video Class control payloads.
//!
//! Control payloads are little-endian byte buffers. A logical value occupies
//! `bits` consecutive bits starting at bit `offset`, where bit 0 is the least
//! significant bit of byte 0. Fields may start and end anywhere inside a byte.
//!
//! This crate is intentionally I/O-free and allocation-free. It provides the
//! pure functions used by the control engine to read and write mapped values,
//! plus helpers for the per-entity capability bitmaps (`bmControls`).
//!
//! Out-of-buffer bits read as zero and out-of-buffer writes are dropped, so
//! callers that validated their layout up front never observe a panic.

#![cfg_attr(not(test), no_std)]
#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod bitmap;
pub mod field;

pub use bitmap::{clear_bit, set_bit, set_bits, test_bit, weight};
pub use field::{BitField, MAX_FIELD_BITS, extract, insert};
