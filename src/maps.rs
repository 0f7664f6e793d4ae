//! Per-voxel result maps
//!
//! A fixed set of named 3-D arrays, all with the spatial shape of the volume
//! they were created for. `Mask` selects which voxels take part in fitting;
//! the others hold fitted parameters and fit quality.

use std::fmt;
use std::str::FromStr;

use ndarray::Array3;
use tracing::warn;

use crate::{Error, Result};
use crate::model::{Baseline, TimeCourseModel, Variant};
use crate::types::{Shape3, Voxel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapName { Mask, Peak, R1, R2, Delay1, Delay2, Base, Chis, Badfit }

impl MapName {
    pub const ALL: [MapName; 9] = {
        use MapName::*;
        [Mask, Peak, R1, R2, Delay1, Delay2, Base, Chis, Badfit]
    };

    pub fn name(self) -> &'static str {
        use MapName::*;
        match self {
            Mask   => "Mask",
            Peak   => "Peak",
            R1     => "R1",
            R2     => "R2",
            Delay1 => "Delay1",
            Delay2 => "Delay2",
            Base   => "Base",
            Chis   => "Chis",
            Badfit => "Badfit",
        }
    }

    fn index(self) -> usize { self as usize }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for MapName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.iter().copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::InvalidSetting { name: "map", reason: format!("no result map called `{s}`") })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultMaps {
    maps: Vec<Array3<f64>>,
}

impl ResultMaps {

    /// Zero-filled maps of the given `[ny, nx, nz]` shape, with every voxel masked in
    pub fn new(shape: Shape3) -> Self {
        let maps = MapName::ALL.iter()
            .map(|&name| match name {
                MapName::Mask => Array3::ones(shape),
                _             => Array3::zeros(shape),
            })
            .collect();
        Self { maps }
    }

    /// Re-zero every map for a volume of `shape`; `Mask` goes back to all ones
    pub fn reset(&mut self, shape: Shape3) { *self = Self::new(shape) }

    pub fn shape(&self) -> Shape3 {
        let d = self.maps[0].dim();
        [d.0, d.1, d.2]
    }

    pub fn get(&self, name: MapName) -> &Array3<f64> { &self.maps[name.index()] }

    pub fn value(&self, name: MapName, voxel: Voxel) -> Result<f64> {
        self.check(voxel)?;
        Ok(self.get(name)[voxel.yxz()])
    }

    pub fn set_voxel(&mut self, name: MapName, voxel: Voxel, value: f64) -> Result<()> {
        self.check(voxel)?;
        self.maps[name.index()][voxel.yxz()] = value;
        Ok(())
    }

    /// Replace the whole mask. A mask of the wrong shape is rejected and the
    /// current mask left untouched.
    pub fn replace_mask(&mut self, mask: &Array3<i32>) -> Result<()> {
        let d = mask.dim();
        let got = [d.0, d.1, d.2];
        let expected = self.shape();
        if got != expected {
            warn!("Mask of shape {got:?} rejected: maps are {expected:?}");
            return Err(Error::MaskShape { expected, got });
        }
        self.maps[MapName::Mask.index()] = mask.mapv(f64::from);
        Ok(())
    }

    pub fn reset_mask(&mut self) {
        self.maps[MapName::Mask.index()].fill(1.0);
    }

    pub fn is_masked_in(&self, voxel: Voxel) -> bool {
        voxel.is_inside(self.shape()) && self.get(MapName::Mask)[voxel.yxz()] != 0.0
    }

    /// Every masked voxel, slice by slice, rows within a slice, `x` fastest
    pub fn all_voxels(&self) -> Vec<Voxel> {
        let [_, _, nz] = self.shape();
        (0..nz).flat_map(|z| self.voxels_in_slice(z)).collect()
    }

    /// Masked voxels of slice `z`, `x` fastest
    pub fn voxels_in_slice(&self, z: usize) -> Vec<Voxel> {
        let [ny, nx, nz] = self.shape();
        if z >= nz { return vec![] }
        let mask = self.get(MapName::Mask);
        itertools::iproduct!(0..ny, 0..nx)
            .filter(|&(y, x)| mask[[y, x, z]] != 0.0)
            .map(|(y, x)| Voxel::new(x, y, z))
            .collect()
    }

    /// Parameter vector of `variant` as stored for `voxel`
    pub fn params_for(&self, variant: &Variant, voxel: Voxel) -> Result<Vec<f64>> {
        use MapName::*;
        self.check(voxel)?;
        let names: &[MapName] = match variant.model {
            TimeCourseModel::ExponentialRateDecay  => &[Peak, R1, R2, Delay1, Delay2, Base],
            TimeCourseModel::ExponentialWashinOnly => &[Peak, R1, Delay1, Base],
        };
        let names = match variant.baseline {
            Baseline::Fitted   => names,
            Baseline::Fixed(_) => &names[..names.len() - 1],
        };
        Ok(names.iter().map(|&n| self.get(n)[voxel.yxz()]).collect())
    }

    fn check(&self, voxel: Voxel) -> Result<()> {
        let shape = self.shape();
        if voxel.is_inside(shape) { Ok(()) }
        else { Err(Error::VoxelOutOfRange { x: voxel.x, y: voxel.y, z: voxel.z, shape }) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn fresh_maps_have_unit_mask_and_zero_values() {
        let maps = ResultMaps::new([3, 4, 2]);
        assert_eq!(maps.shape(), [3, 4, 2]);
        for name in MapName::ALL {
            assert_eq!(maps.get(name).dim(), (3, 4, 2));
            let expected = if name == MapName::Mask { 1.0 } else { 0.0 };
            assert!(maps.get(name).iter().all(|&v| v == expected), "{name}");
        }
    }

    #[test]
    fn reset_changes_shape_of_every_map() {
        let mut maps = ResultMaps::new([3, 4, 2]);
        maps.set_voxel(MapName::Peak, Voxel::new(1, 1, 1), 5.0).unwrap();
        maps.reset([5, 5, 5]);
        for name in MapName::ALL {
            assert_eq!(maps.get(name).dim(), (5, 5, 5));
        }
        assert!(maps.get(MapName::Peak).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn set_voxel_addresses_y_x_z() {
        let mut maps = ResultMaps::new([3, 4, 2]);
        maps.set_voxel(MapName::Chis, Voxel::new(3, 1, 0), 2.5).unwrap();
        assert_eq!(maps.get(MapName::Chis)[[1, 3, 0]], 2.5);
        assert_eq!(maps.value(MapName::Chis, Voxel::new(3, 1, 0)).unwrap(), 2.5);
        assert!(matches!(maps.set_voxel(MapName::Chis, Voxel::new(4, 0, 0), 1.0),
                         Err(Error::VoxelOutOfRange { .. })));
    }

    #[test]
    fn mismatched_mask_leaves_store_untouched() {
        let mut maps = ResultMaps::new([64, 64, 8]);
        let mut good = Array3::zeros((64, 64, 8));
        good[[10, 20, 3]] = 4;
        maps.replace_mask(&good).unwrap();
        let before = maps.clone();
        let result = maps.replace_mask(&Array3::ones((64, 64, 4)));
        assert!(matches!(result, Err(Error::MaskShape { expected: [64, 64, 8], got: [64, 64, 4] })));
        assert_eq!(maps, before);
        maps.reset_mask();
        assert_eq!(maps.all_voxels().len(), 64 * 64 * 8);
    }

    #[test]
    fn voxel_enumeration_order() {
        let mut maps = ResultMaps::new([2, 2, 2]);
        let mut mask = Array3::ones((2, 2, 2));
        mask[[0, 1, 0]] = 0;
        maps.replace_mask(&mask).unwrap();
        let got: Vec<_> = maps.all_voxels().into_iter().map(|v| (v.x, v.y, v.z)).collect();
        assert_eq!(got, vec![
            (0, 0, 0),         (0, 1, 0), (1, 1, 0),
            (0, 0, 1), (1, 0, 1), (0, 1, 1), (1, 1, 1),
        ]);
        assert_eq!(maps.voxels_in_slice(1).len(), 4);
        assert!(maps.voxels_in_slice(2).is_empty());
        assert!(!maps.is_masked_in(Voxel::new(1, 0, 0)));
    }

    #[rstest(model, baseline, expected,
             case(TimeCourseModel::ExponentialRateDecay , Baseline::Fitted    , vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
             case(TimeCourseModel::ExponentialRateDecay , Baseline::Fixed(0.5), vec![1.0, 2.0, 3.0, 4.0, 5.0]),
             case(TimeCourseModel::ExponentialWashinOnly, Baseline::Fitted    , vec![1.0, 2.0, 4.0, 6.0]),
             case(TimeCourseModel::ExponentialWashinOnly, Baseline::Fixed(0.5), vec![1.0, 2.0, 4.0]),
    )]
    fn params_from_maps(model: TimeCourseModel, baseline: Baseline, expected: Vec<f64>) {
        use MapName::*;
        let mut maps = ResultMaps::new([1, 1, 1]);
        let v = Voxel::new(0, 0, 0);
        for (name, value) in [(Peak, 1.0), (R1, 2.0), (R2, 3.0), (Delay1, 4.0), (Delay2, 5.0), (Base, 6.0)] {
            maps.set_voxel(name, v, value).unwrap();
        }
        assert_eq!(maps.params_for(&Variant::new(model, baseline), v).unwrap(), expected);
    }

    #[test]
    fn names_round_trip() {
        for name in MapName::ALL {
            assert_eq!(name.name().parse::<MapName>().unwrap(), name);
        }
        assert!("Sig".parse::<MapName>().is_err());
    }
}
