pub mod animation;
pub mod metadata;
pub mod sequence;
pub mod types;
