//! Register-level definitions for the AR600x SDIO wireless card.
//!
//! Everything in here is a plain constant: offsets, bit positions, protocol
//! identifiers and the static CIS tuple tables. Behaviour lives in `ar6kemu`.

pub mod ar6k;
pub mod sdio;
