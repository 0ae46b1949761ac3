//! Position hold for a MultiWii rotorcraft fed by a motion capture system.
//!
//! The motion capture station streams position, heading and pilot sticks over UDP
//! ([`feed`]). The [`control_loop`] turns the horizontal position error into roll and pitch
//! commands ([`pid`], [`frame`], [`shaper`]) and sends them to the flight controller over MSP
//! ([`flight_link`], [`msp`]) at a fixed rate.

pub mod config;
pub mod control_loop;
pub mod error;
pub mod feed;
pub mod flight_link;
pub mod frame;
pub mod log;
pub mod msp;
pub mod pid;
pub mod polling;
pub mod shaper;
pub mod telemetry;
pub mod timer;
pub mod types;
