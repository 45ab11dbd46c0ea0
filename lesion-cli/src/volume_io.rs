//! JSON volume files: `{"shape": [..], "data": [..]}` with row-major data.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, ensure, Context, Result};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};

/// Highest rank the command line accepts.
pub const MAX_RANK: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDocument {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl VolumeDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read volume {}", path.display()))?;
        let document: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse volume {}", path.display()))?;
        document
            .validate()
            .with_context(|| format!("invalid volume {}", path.display()))?;

        tracing::debug!(path = %path.display(), shape = ?document.shape, "loaded volume");
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(self)?;
        fs::write(path, text).with_context(|| format!("failed to write volume {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_RANK).contains(&self.rank()),
            "rank {} is not supported, expected 1 to {MAX_RANK}",
            self.rank()
        );
        let voxels: usize = self.shape.iter().product();
        ensure!(
            voxels == self.data.len(),
            "shape {:?} holds {voxels} voxels but {} values were given",
            self.shape,
            self.data.len()
        );
        Ok(())
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Result<Tensor<B, D>> {
        let shape: [usize; D] = self
            .shape
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("expected rank {D}, found shape {:?}", self.shape))?;
        Ok(Tensor::from_data(
            TensorData::new(self.data.clone(), shape),
            device,
        ))
    }

    pub fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let data = tensor
            .into_data()
            .convert::<f32>()
            .into_vec::<f32>()
            .map_err(|err| anyhow!("failed to read tensor data: {err:?}"))?;
        Ok(Self { shape, data })
    }
}

/// Checks that two volumes can be scored against each other.
pub fn ensure_compatible(a: &VolumeDocument, b: &VolumeDocument) -> Result<()> {
    if a.shape != b.shape {
        bail!("volume shapes differ: {:?} vs {:?}", a.shape, b.shape);
    }
    Ok(())
}
