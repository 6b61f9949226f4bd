use log::{info, warn};
use ndarray as nd;
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, WriteNpzError};
use std::{
    fs::File,
    io::{Cursor, Read, Seek, Write},
    path::Path,
};
use thiserror::Error;

use crate::common::animation::CleanAnimation;
use crate::common::metadata::model_metadata;
use crate::common::sequence::{FrameRecord, SequenceInput};
use crate::common::types::ModelType;
use crate::error::StructuralError;

// modelType:
// 0 - SMPL
// 1 - SMPLX

const DEFAULT_FRAME_RATE: f32 = 30.0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ReadNpz(#[from] ReadNpzError),
    #[error(transparent)]
    WriteNpz(#[from] WriteNpzError),
    #[error("array {key} has unexpected shape")]
    BadShape { key: &'static str },
    #[error("unknown model code {0}")]
    UnknownModelCode(i32),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

fn model_code(model: ModelType) -> i32 {
    match model {
        ModelType::Smpl => 0,
        ModelType::SmplX => 1,
    }
}

fn model_from_code(code: i32) -> Result<ModelType, CodecError> {
    match code {
        0 => Ok(ModelType::Smpl),
        1 => Ok(ModelType::SmplX),
        other => Err(CodecError::UnknownModelCode(other)),
    }
}

/// Container for a raw estimator dump: one rotation-matrix block plus the
/// optional per-frame camera and detection-box tracks. Every array shares
/// the frame axis.
pub struct SequenceCodec {
    pub model: i32,
    pub frame_rate: Option<f32>,
    /// `(N, J, 3, 3)`.
    pub rotations: nd::Array4<f32>,
    /// `(N, B)` shape coefficients.
    pub betas: Option<nd::Array2<f32>>,
    /// `(N, 3)` weak-perspective `[s, tx, ty]`.
    pub camera: Option<nd::Array2<f32>>,
    /// `(N, 2)` detection-box top-left corners in image pixels.
    pub bbox_top_left: Option<nd::Array2<f32>>,
    /// `(N,)` crop-to-box scale ratios.
    pub bbox_scale_ratio: Option<nd::Array1<f32>>,
}

impl SequenceCodec {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        Self::from_npz_reader(&mut npz)
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, CodecError> {
        let mut npz = NpzReader::new(Cursor::new(buf))?;
        Self::from_npz_reader(&mut npz)
    }

    fn from_npz_reader<R: Read + Seek>(npz: &mut NpzReader<R>) -> Result<Self, CodecError> {
        let model_arr: nd::Array0<i32> = npz.by_name("modelType")?;
        let rotations: nd::Array4<f32> = npz.by_name("rotations")?;
        let frame_rate = npz
            .by_name("frameRate")
            .ok()
            .map(|arr: nd::Array0<f32>| arr.into_scalar());

        Ok(Self {
            model: model_arr.into_scalar(),
            frame_rate,
            rotations,
            betas: npz.by_name("betas").ok(),
            camera: npz.by_name("camera").ok(),
            bbox_top_left: npz.by_name("bboxTopLeft").ok(),
            bbox_scale_ratio: npz.by_name("bboxScaleRatio").ok(),
        })
    }

    pub fn to_buf(&self) -> Result<Vec<u8>, CodecError> {
        let mut cursor = Cursor::new(Vec::new());
        let mut npz = NpzWriter::new_compressed(&mut cursor);
        self.write_to_npz(&mut npz)?;
        npz.finish()?;
        Ok(cursor.into_inner())
    }

    pub fn write_to_npz<W: Write + Seek>(&self, npz: &mut NpzWriter<W>) -> Result<(), CodecError> {
        npz.add_array("modelType", &nd::Array0::<i32>::from_elem((), self.model))?;
        if let Some(frame_rate) = self.frame_rate {
            npz.add_array("frameRate", &nd::Array0::<f32>::from_elem((), frame_rate))?;
        }
        npz.add_array("rotations", &self.rotations)?;
        if let Some(betas) = &self.betas {
            npz.add_array("betas", betas)?;
        }
        if let Some(camera) = &self.camera {
            npz.add_array("camera", camera)?;
        }
        if let Some(bbox_top_left) = &self.bbox_top_left {
            npz.add_array("bboxTopLeft", bbox_top_left)?;
        }
        if let Some(bbox_scale_ratio) = &self.bbox_scale_ratio {
            npz.add_array("bboxScaleRatio", bbox_scale_ratio)?;
        }
        Ok(())
    }

    /// Split the dense arrays back into per-frame records and run the usual
    /// ingestion validation.
    pub fn into_sequence(self) -> Result<SequenceInput, CodecError> {
        let model = model_from_code(self.model)?;
        let n = self.rotations.dim().0;

        for (key, cols, arr) in [
            ("camera", 3, self.camera.as_ref()),
            ("bboxTopLeft", 2, self.bbox_top_left.as_ref()),
        ] {
            if let Some(arr) = arr {
                if arr.dim() != (n, cols) {
                    return Err(CodecError::BadShape { key });
                }
            }
        }
        if let Some(ratio) = &self.bbox_scale_ratio {
            if ratio.len() != n {
                return Err(CodecError::BadShape { key: "bboxScaleRatio" });
            }
        }
        if let Some(betas) = &self.betas {
            if betas.dim().0 != n {
                return Err(CodecError::BadShape { key: "betas" });
            }
        }

        let frame_rate = self.frame_rate.unwrap_or_else(|| {
            warn!("no frameRate in container, assuming {DEFAULT_FRAME_RATE} fps");
            DEFAULT_FRAME_RATE
        });

        let records: Vec<FrameRecord> = (0..n)
            .map(|i| FrameRecord {
                rotations: Some(self.rotations.index_axis(nd::Axis(0), i).to_owned()),
                betas: self.betas.as_ref().map(|b| b.row(i).to_owned()),
                camera: self.camera.as_ref().map(|c| [c[(i, 0)], c[(i, 1)], c[(i, 2)]]),
                bbox_top_left: self
                    .bbox_top_left
                    .as_ref()
                    .map(|b| [b[(i, 0)], b[(i, 1)]]),
                bbox_scale_ratio: self.bbox_scale_ratio.as_ref().map(|r| r[i]),
            })
            .collect();

        Ok(SequenceInput::from_records(records, model, frame_rate)?)
    }
}

/// Serialized form of a [`CleanAnimation`]. Joint names and parents are
/// derivable from the model code but the parent table is written anyway so
/// non-Rust consumers do not need ours.
pub struct AnimationCodec {
    pub model: i32,
    pub frame_rate: f32,
    /// `(N, J, 4)` quaternions `[w, x, y, z]`.
    pub rotations: nd::Array3<f32>,
    pub root_translation: Option<nd::Array2<f32>>,
    pub shape_parameters: Option<nd::Array1<f32>>,
}

impl AnimationCodec {
    pub fn from_animation(anim: &CleanAnimation) -> Self {
        Self {
            model: model_code(anim.metadata.model),
            frame_rate: anim.fps,
            rotations: anim.rotations.clone(),
            root_translation: anim.root_translation.clone(),
            shape_parameters: anim.mean_betas.clone(),
        }
    }

    /// # Errors
    /// [`CodecError::UnknownModelCode`] or [`CodecError::BadShape`] when the
    /// container disagrees with its own model code.
    pub fn into_animation(self) -> Result<CleanAnimation, CodecError> {
        let model = model_from_code(self.model)?;
        let metadata = model_metadata(&model);
        if self.rotations.dim().1 != metadata.num_joints || self.rotations.dim().2 != 4 {
            return Err(CodecError::BadShape { key: "rotations" });
        }
        Ok(CleanAnimation {
            metadata,
            rotations: self.rotations,
            root_translation: self.root_translation,
            mean_betas: self.shape_parameters,
            fps: self.frame_rate,
        })
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecError> {
        info!("saving cleaned animation to {}", path.as_ref().display());
        let mut npz = NpzWriter::new_compressed(File::create(path)?);
        self.write_to_npz(&mut npz)?;
        npz.finish()?;
        Ok(())
    }

    pub fn to_buf(&self) -> Result<Vec<u8>, CodecError> {
        let mut cursor = Cursor::new(Vec::new());
        let mut npz = NpzWriter::new_compressed(&mut cursor);
        self.write_to_npz(&mut npz)?;
        npz.finish()?;
        Ok(cursor.into_inner())
    }

    pub fn write_to_npz<W: Write + Seek>(&self, npz: &mut NpzWriter<W>) -> Result<(), CodecError> {
        npz.add_array("modelType", &nd::Array0::<i32>::from_elem((), self.model))?;
        npz.add_array("frameRate", &nd::Array0::<f32>::from_elem((), self.frame_rate))?;
        npz.add_array("rotations", &self.rotations)?;
        if let Some(root_translation) = &self.root_translation {
            npz.add_array("rootTranslation", root_translation)?;
        }
        if let Some(shape_parameters) = &self.shape_parameters {
            npz.add_array("shapeParameters", shape_parameters)?;
        }
        if let Ok(model) = model_from_code(self.model) {
            let parents = nd::Array1::from_iter(model_metadata(&model).joint_parents.iter().copied());
            npz.add_array("jointParents", &parents)?;
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        Self::from_npz_reader(&mut npz)
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, CodecError> {
        let mut npz = NpzReader::new(Cursor::new(buf))?;
        Self::from_npz_reader(&mut npz)
    }

    fn from_npz_reader<R: Read + Seek>(npz: &mut NpzReader<R>) -> Result<Self, CodecError> {
        let model_arr: nd::Array0<i32> = npz.by_name("modelType")?;
        let frame_rate_arr: nd::Array0<f32> = npz.by_name("frameRate")?;
        Ok(Self {
            model: model_arr.into_scalar(),
            frame_rate: frame_rate_arr.into_scalar(),
            rotations: npz.by_name("rotations")?,
            root_translation: npz.by_name("rootTranslation").ok(),
            shape_parameters: npz.by_name("shapeParameters").ok(),
        })
    }
}
