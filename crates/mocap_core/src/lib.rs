pub mod cleanup;
pub mod codec;
pub mod common;
pub mod conversions;
pub mod error;
pub mod pipeline;
pub mod retarget;
