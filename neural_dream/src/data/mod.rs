//! Camera sampling and ray batches.
//!
//! - [`CameraSampler`]: random training cameras and evaluation orbits
//! - [`RayBatch`]: per-pixel rays plus camera angles for one batch
//! - [`Lcg`]: seeded random numbers shared by samplers and guidance

mod batch;
mod camera;
mod rng;

pub use batch::RayBatch;
pub use camera::{orbit_cameras, Camera, CameraSampler, Pose};
pub use rng::Lcg;
