//! Audio capture and clip encoding.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod encode;
