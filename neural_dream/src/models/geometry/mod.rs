//! Geometry implementations.

mod implicit_volume;

pub use implicit_volume::{ImplicitVolume, ImplicitVolumeConfig, NormalType};
