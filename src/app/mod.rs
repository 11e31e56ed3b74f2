//! Application core: node orchestration, zero direct I/O.
//!
//! Both firmware images are thin shells around a service from this
//! module.  All interaction with hardware and the network happens through
//! the **port traits** in [`ports`], keeping this layer testable on the
//! host without real peripherals.

pub mod camera_node;
pub mod events;
pub mod ports;
pub mod sensor_node;
