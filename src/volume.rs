//! 4-D image volume with its time axis, and the masks derived from it

use ndarray::{s, Array2, Array3, Array4, Axis};

use crate::{Error, Result};
use crate::types::{Intensity, Shape3, Time, Voxel};

/// Image row used for the noise estimate: near the edge, outside the anatomy
pub const NOISE_ROW: usize = 4;

/// Multiple of the noise level below which a voxel's mean signal is masked out
pub const MASK_NOISE_FACTOR: f64 = 6.0;

/// Intensities stored `(y, x, z, t)`, with one shared time axis in seconds
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    data: Array4<Intensity>,
    time: Vec<Time>,
}

impl Volume {

    pub fn new(data: Array4<Intensity>, time: Vec<Time>) -> Result<Self> {
        let nt = data.dim().3;
        if time.len() != nt {
            return Err(Error::TimeAxis(format!("{} time values for a volume with {nt} time points", time.len())));
        }
        if let Some(t) = time.iter().find(|t| !t.is_finite()) {
            return Err(Error::TimeAxis(format!("non-finite time value {t}")));
        }
        if let Some(w) = time.windows(2).find(|w| w[1] <= w[0]) {
            return Err(Error::TimeAxis(format!("not increasing: {} followed by {}", w[0], w[1])));
        }
        Ok(Self { data, time })
    }

    /// Spatial shape `[ny, nx, nz]`
    pub fn shape(&self) -> Shape3 {
        let (ny, nx, nz, _) = self.data.dim();
        [ny, nx, nz]
    }

    pub fn n_times(&self) -> usize { self.time.len() }
    pub fn time(&self) -> &[Time] { &self.time }
    pub fn data(&self) -> &Array4<Intensity> { &self.data }

    /// Time course of one voxel
    pub fn series(&self, voxel: Voxel) -> Result<Vec<Intensity>> {
        let shape = self.shape();
        if !voxel.is_inside(shape) {
            return Err(Error::VoxelOutOfRange { x: voxel.x, y: voxel.y, z: voxel.z, shape });
        }
        Ok(self.data.slice(s![voxel.y, voxel.x, voxel.z, ..]).to_vec())
    }

    /// Population standard deviation of every sample in image row 4 (or the
    /// last row of smaller images), across all columns, slices and times.
    pub fn noise(&self) -> Intensity {
        if self.data.is_empty() { return 0.0 }
        let y = NOISE_ROW.min(self.data.dim().0 - 1);
        self.data.index_axis(Axis(0), y).std(0.0)
    }

    /// Mask of voxels whose mean signal over time reaches `6 * noise` (or 1% of
    /// the data maximum when there is no noise), with holes filled in every slice.
    pub fn auto_mask(&self, noise: Intensity) -> Array3<i32> {
        let [ny, nx, nz] = self.shape();
        let threshold = if noise > 0.0 {
            MASK_NOISE_FACTOR * noise
        } else {
            0.01 * self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        };
        let mut mask = Array3::zeros((ny, nx, nz));
        if self.data.is_empty() { return mask }
        let mean = self.data.mean_axis(Axis(3)).unwrap_or_else(|| Array3::zeros((ny, nx, nz)));
        for z in 0..nz {
            let above = mean.slice(s![.., .., z]).mapv(|m| m >= threshold);
            let filled = fill_holes(&above);
            mask.slice_mut(s![.., .., z]).assign(&filled.mapv(i32::from));
        }
        mask
    }
}

/// Set every `false` pixel that cannot be reached from the image border
/// through 4-connected `false` pixels.
pub fn fill_holes(image: &Array2<bool>) -> Array2<bool> {
    let (ny, nx) = image.dim();
    let mut outside = Array2::from_elem((ny, nx), false);
    let mut stack: Vec<(usize, usize)> = vec![];
    let visit = |y: usize, x: usize, outside: &mut Array2<bool>, stack: &mut Vec<(usize, usize)>| {
        if !image[[y, x]] && !outside[[y, x]] {
            outside[[y, x]] = true;
            stack.push((y, x));
        }
    };
    for y in 0..ny {
        for x in [0, nx.saturating_sub(1)] {
            if nx > 0 { visit(y, x, &mut outside, &mut stack) }
        }
    }
    for x in 0..nx {
        for y in [0, ny.saturating_sub(1)] {
            if ny > 0 { visit(y, x, &mut outside, &mut stack) }
        }
    }
    while let Some((y, x)) = stack.pop() {
        if y > 0      { visit(y - 1, x, &mut outside, &mut stack) }
        if y + 1 < ny { visit(y + 1, x, &mut outside, &mut stack) }
        if x > 0      { visit(y, x - 1, &mut outside, &mut stack) }
        if x + 1 < nx { visit(y, x + 1, &mut outside, &mut stack) }
    }
    outside.mapv(|o| !o)
}

/// Sum equally shaped masks (for example left and right lung) into one
pub fn combine_masks(masks: &[Array3<i32>]) -> Result<Option<Array3<i32>>> {
    let Some((first, rest)) = masks.split_first() else { return Ok(None) };
    let mut sum = first.clone();
    for other in rest {
        if other.dim() != first.dim() {
            let (a, b) = (first.dim(), other.dim());
            return Err(Error::MaskShapesDiffer { first: [a.0, a.1, a.2], other: [b.0, b.1, b.2] });
        }
        sum += other;
    }
    Ok(Some(sum))
}

/// Seconds since the first acquisition, from `hhmmss.frac` acquisition
/// times given in any order.
pub fn time_axis_from_acquisition_times<S: AsRef<str>>(stamps: &[S]) -> Result<Vec<Time>> {
    let mut seconds = stamps.iter()
        .map(|s| seconds_since_midnight(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    seconds.sort_by(f64::total_cmp);
    let Some(&first) = seconds.first() else { return Ok(vec![]) };
    Ok(seconds.into_iter().map(|t| t - first).collect())
}

fn seconds_since_midnight(stamp: &str) -> Result<f64> {
    let stamp = stamp.trim();
    let bad = || Error::TimeAxis(format!("`{stamp}` is not a hhmmss.frac time"));
    if stamp.len() < 6 || !stamp.is_char_boundary(2) || !stamp.is_char_boundary(4) { return Err(bad()) }
    let field = |r: std::ops::Range<usize>| stamp[r].parse::<u32>().map_err(|_| bad());
    let hours   = field(0..2)?;
    let minutes = field(2..4)?;
    let secs: f64 = stamp[4..].parse().map_err(|_| bad())?;
    Ok(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + secs)
}
