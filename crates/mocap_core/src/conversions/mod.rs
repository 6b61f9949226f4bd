pub mod normalize;
pub mod root_trans;
