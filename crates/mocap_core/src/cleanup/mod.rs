pub mod clamp;
pub mod continuity;
pub mod outlier;
pub mod smooth;
pub mod velocity;
