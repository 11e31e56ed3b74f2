//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one node loop against
//! mock adapters.  All tests run on the host (x86_64) with no real
//! hardware required.

mod camera_node_tests;
mod mock_hw;
mod sensor_node_tests;
