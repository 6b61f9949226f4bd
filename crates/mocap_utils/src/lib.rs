pub mod numerical;
pub mod quat;
