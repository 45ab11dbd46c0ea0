//! Connected component labeling for N-dimensional binary volumes.
//!
//! Regions ("lesions") are maximal sets of foreground voxels joined through
//! the neighbourhood selected by [`Connectivity`]. Region ids start at 1 and
//! follow the raster (row-major) order of each region's first voxel; 0 is
//! background.

use serde::{Deserialize, Serialize};

use crate::volume::BinaryVolume;

/// Neighbourhood used to join foreground voxels into regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Voxels sharing a face: 4-connectivity in 2-D, 6 in 3-D.
    #[default]
    Face,
    /// Voxels sharing a face or an edge: 8 in 2-D, 18 in 3-D.
    Edge,
    /// Voxels sharing any corner: 8 in 2-D, 26 in 3-D.
    Full,
}

impl Connectivity {
    /// Maximum number of axes a neighbour offset may move along.
    pub fn order(self, rank: usize) -> usize {
        let order = match self {
            Self::Face => 1,
            Self::Edge => 2,
            Self::Full => rank,
        };
        order.min(rank)
    }

    /// All neighbour offsets for a volume of the given rank.
    ///
    /// Each offset has entries in `{-1, 0, 1}`, is nonzero, and moves along at
    /// most [`Connectivity::order`] axes.
    pub fn offsets(self, rank: usize) -> Vec<Vec<isize>> {
        let order = self.order(rank);
        let mut offsets = Vec::new();
        let mut offset = vec![-1isize; rank];

        if rank == 0 {
            return offsets;
        }

        loop {
            let moved = offset.iter().filter(|&&step| step != 0).count();
            if moved > 0 && moved <= order {
                offsets.push(offset.clone());
            }

            // Odometer over {-1, 0, 1}^rank, last axis fastest.
            let mut axis = rank;
            loop {
                if axis == 0 {
                    return offsets;
                }
                axis -= 1;
                if offset[axis] < 1 {
                    offset[axis] += 1;
                    break;
                }
                offset[axis] = -1;
            }
        }
    }
}

/// A volume whose foreground voxels carry region ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledVolume {
    shape: Vec<usize>,
    labels: Vec<u32>,
    region_sizes: Vec<usize>,
}

impl LabeledVolume {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major region id per voxel; 0 is background.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Number of regions found.
    pub fn num_regions(&self) -> usize {
        self.region_sizes.len()
    }

    /// Voxel count of each region, indexed by `id - 1`.
    pub fn region_sizes(&self) -> &[usize] {
        &self.region_sizes
    }

    /// Voxel count of region `id`, or `None` for background and unknown ids.
    pub fn region_size(&self, id: u32) -> Option<usize> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.region_sizes.get(index).copied()
    }
}

/// Labels the connected foreground regions of a volume.
pub fn label_regions(volume: &BinaryVolume, connectivity: Connectivity) -> LabeledVolume {
    let shape = volume.shape().to_vec();
    let mask = volume.mask();
    let rank = shape.len();
    let offsets = connectivity.offsets(rank);

    let mut strides = vec![1usize; rank];
    for axis in (0..rank.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }

    let mut labels = vec![0u32; mask.len()];
    let mut region_sizes = Vec::new();
    let mut stack = Vec::new();
    let mut coords = vec![0usize; rank];

    for seed in 0..mask.len() {
        if !mask[seed] || labels[seed] != 0 {
            continue;
        }

        let region = region_sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[seed] = region;
        stack.push(seed);

        while let Some(index) = stack.pop() {
            size += 1;

            for axis in 0..rank {
                coords[axis] = (index / strides[axis]) % shape[axis];
            }

            for offset in &offsets {
                let Some(neighbor) = neighbor_index(&coords, offset, &shape, &strides) else {
                    continue;
                };
                if mask[neighbor] && labels[neighbor] == 0 {
                    labels[neighbor] = region;
                    stack.push(neighbor);
                }
            }
        }

        region_sizes.push(size);
    }

    tracing::trace!(
        shape = ?shape,
        regions = region_sizes.len(),
        "labeled connected regions"
    );

    LabeledVolume {
        shape,
        labels,
        region_sizes,
    }
}

/// Row-major index of `coords + offset`, or `None` outside the volume.
fn neighbor_index(
    coords: &[usize],
    offset: &[isize],
    shape: &[usize],
    strides: &[usize],
) -> Option<usize> {
    let mut index = 0;
    for axis in 0..coords.len() {
        let coord = coords[axis].checked_add_signed(offset[axis])?;
        if coord >= shape[axis] {
            return None;
        }
        index += coord * strides[axis];
    }
    Some(index)
}

/// Counts connected foreground regions.
pub fn count_regions(volume: &BinaryVolume, connectivity: Connectivity) -> usize {
    label_regions(volume, connectivity).num_regions()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(shape: &[usize], mask: &[u8]) -> BinaryVolume {
        BinaryVolume::new(shape.to_vec(), mask.iter().map(|&v| v != 0).collect()).unwrap()
    }

    #[test]
    fn connectivity_offsets_match_neighbourhood_sizes() {
        assert_eq!(Connectivity::Face.offsets(2).len(), 4);
        assert_eq!(Connectivity::Full.offsets(2).len(), 8);
        assert_eq!(Connectivity::Face.offsets(3).len(), 6);
        assert_eq!(Connectivity::Edge.offsets(3).len(), 18);
        assert_eq!(Connectivity::Full.offsets(3).len(), 26);
        assert_eq!(Connectivity::Face.offsets(1).len(), 2);
        assert!(Connectivity::Full.offsets(0).is_empty());
    }

    #[test]
    fn label_regions_face_connectivity_splits_diagonal() {
        #[rustfmt::skip]
        let volume = binary(&[3, 3], &[
            1, 0, 0,
            0, 1, 0,
            0, 0, 1,
        ]);

        assert_eq!(count_regions(&volume, Connectivity::Face), 3);
        assert_eq!(count_regions(&volume, Connectivity::Full), 1);
    }

    #[test]
    fn label_regions_assigns_ids_in_raster_order() {
        #[rustfmt::skip]
        let volume = binary(&[3, 4], &[
            0, 1, 0, 1,
            0, 1, 0, 1,
            1, 0, 0, 0,
        ]);

        let labeled = label_regions(&volume, Connectivity::Face);

        #[rustfmt::skip]
        let expected: [u32; 12] = [
            0, 1, 0, 2,
            0, 1, 0, 2,
            3, 0, 0, 0,
        ];
        assert_eq!(labeled.labels(), &expected);
        assert_eq!(labeled.region_sizes(), &[2, 2, 1]);
        assert_eq!(labeled.region_size(3), Some(1));
        assert_eq!(labeled.region_size(0), None);
        assert_eq!(labeled.region_size(4), None);
    }

    #[test]
    fn label_regions_three_dimensional_cube_is_one_region() {
        let volume = binary(&[3, 3, 3], &[1; 27]);
        let labeled = label_regions(&volume, Connectivity::Face);

        assert_eq!(labeled.num_regions(), 1);
        assert_eq!(labeled.region_sizes(), &[27]);
    }

    #[test]
    fn label_regions_wraps_no_rows() {
        // Last voxel of row 0 and first voxel of row 1 are adjacent in memory only.
        #[rustfmt::skip]
        let volume = binary(&[2, 3], &[
            0, 0, 1,
            1, 0, 0,
        ]);

        assert_eq!(count_regions(&volume, Connectivity::Face), 2);
        assert_eq!(count_regions(&volume, Connectivity::Full), 2);
    }

    #[test]
    fn label_regions_empty_volume_has_no_regions() {
        let volume = binary(&[0, 4], &[]);
        assert_eq!(count_regions(&volume, Connectivity::Full), 0);

        let volume = binary(&[5, 5], &[0; 25]);
        let labeled = label_regions(&volume, Connectivity::Face);
        assert_eq!(labeled.num_regions(), 0);
        assert!(labeled.labels().iter().all(|&label| label == 0));
    }
}
