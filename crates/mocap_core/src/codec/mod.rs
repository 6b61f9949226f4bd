pub mod npz;

pub use npz::{AnimationCodec, CodecError, SequenceCodec};
