//! Shared types for the GGP rendering sample.
//!
//! Everything in here is laid out to be uploaded to the GPU as-is, so all
//! vertex and instance types are `#[repr(C)]` and `Pod`.

mod types;

pub use types::{
    AnimationData, InstanceData, MAX_NUM_BONES, NUM_LIGHTS, NormalData, SamplerKind, SimpleVertex,
};
