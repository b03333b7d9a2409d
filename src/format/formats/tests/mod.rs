//! Unit tests for the codec implementations.
//!
//! Per-codec edge cases live next to the codecs themselves; these modules
//! cover file-level decode/encode behavior and cross-format round-trips.

mod roundtrip_tests;
