//! Volumetric label images
//!
//! Input and output volumes are NIfTI-1 files (`.nii` or `.nii.gz`) holding
//! small signed integer labels. The header of the input is carried along so
//! the output lands in the same physical space.

use std::path::Path;

use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use voxpart_common::{Error, Result};

/// Voxel coordinate as `[x, y, z]`
pub type Coord = [usize; 3];

/// A 3D `i16` label volume plus the header it was read with
#[derive(Debug, Clone)]
pub struct LabelVolume {
    data: Array3<i16>,
    header: NiftiHeader,
}

impl LabelVolume {
    /// Wrap an in-memory array with a default header
    pub fn new(data: Array3<i16>) -> Self {
        Self {
            data,
            header: NiftiHeader::default(),
        }
    }

    /// Read a NIfTI volume, squeezing trailing singleton dimensions
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input file not found: {}", path.display()),
            )));
        }

        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| Error::Image(format!("failed to read {}: {e}", path.display())))?;
        let header = obj.header().clone();
        let array = obj
            .into_volume()
            .into_ndarray::<i16>()
            .map_err(|e| Error::Image(format!("failed to decode {}: {e}", path.display())))?;

        Ok(Self {
            data: into_3d(array)?,
            header,
        })
    }

    /// Write the volume, reusing the header it was read with
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header = self.header.clone();
        // Labels are stored verbatim.
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;

        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&self.data)
            .map_err(|e| Error::Image(format!("failed to write {}: {e}", path.display())))
    }

    /// All-background volume with the same shape and header
    pub fn zeros_like(&self) -> Self {
        Self {
            data: Array3::zeros(self.data.dim()),
            header: self.header.clone(),
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn n_voxels(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    pub fn get(&self, c: Coord) -> i16 {
        self.data[c]
    }

    pub fn set(&mut self, c: Coord, value: i16) {
        self.data[c] = value;
    }
}

fn into_3d(mut array: ArrayD<i16>) -> Result<Array3<i16>> {
    while array.ndim() > 3 && array.shape()[array.ndim() - 1] == 1 {
        let last = array.ndim() - 1;
        array = array.index_axis_move(Axis(last), 0);
    }
    let shape = array.shape().to_vec();
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| Error::Image(format!("expected a 3D volume, got shape {shape:?}")))
}
