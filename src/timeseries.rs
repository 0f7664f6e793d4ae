//! An imported volume together with its fitting setup and result maps

use ndarray::Array3;
use tracing::info;

use crate::Result;
use crate::chain::{CancelToken, Chain, Entry, RunReport};
use crate::config::fit::Config;
use crate::maps::ResultMaps;
use crate::model::Variant;
use crate::types::{Intensity, Voxel};
use crate::volume::{combine_masks, Volume};

#[derive(Clone, Debug)]
pub struct Timeseries {
    volume:  Volume,
    config:  Config,
    noise:   Intensity,
    variant: Variant,
    maps:    ResultMaps,
}

impl Timeseries {

    /// Take ownership of `volume`, estimate its noise and mask it automatically.
    ///
    /// Fails if `config` is invalid or the volume has too few time points for
    /// the configured model.
    pub fn import(volume: Volume, config: Config) -> Result<Self> {
        let noise = volume.noise();
        let mask = volume.auto_mask(noise);
        let mut series = Self::with_noise(volume, config, noise)?;
        series.maps.replace_mask(&mask)?;
        info!("Automatic mask selects {} voxel(s)", series.maps.all_voxels().len());
        Ok(series)
    }

    /// As [`import`](Self::import), but with a mask and noise level supplied
    /// by the caller, as for simulated data.
    pub fn import_with_mask(volume: Volume, config: Config, mask: &Array3<i32>, noise: Intensity) -> Result<Self> {
        let mut series = Self::with_noise(volume, config, noise)?;
        series.maps.replace_mask(mask)?;
        Ok(series)
    }

    fn with_noise(volume: Volume, config: Config, noise: Intensity) -> Result<Self> {
        config.validate()?;
        let variant = Variant::select(config.model, volume.n_times(), noise)?;
        info!("{:?} voxels x {} time points, noise {noise:.3}, fitting {} parameters of {}",
              volume.shape(), volume.n_times(), variant.n_params(), variant.model);
        let maps = ResultMaps::new(volume.shape());
        Ok(Self { volume, config, noise, variant, maps })
    }

    pub fn volume (&self) -> &Volume     { &self.volume }
    pub fn config (&self) -> &Config     { &self.config }
    pub fn noise  (&self) -> Intensity   { self.noise }
    pub fn variant(&self) -> &Variant    { &self.variant }
    pub fn maps   (&self) -> &ResultMaps { &self.maps }

    /// Switch to another configuration; a different model may change the
    /// variant. Existing results are kept.
    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        self.variant = Variant::select(config.model, self.volume.n_times(), self.noise)?;
        self.config = config;
        Ok(())
    }

    /// Clear all results, keeping the current mask
    pub fn reset_results(&mut self) -> Result<()> {
        let mask = self.maps.get(crate::maps::MapName::Mask).mapv(|v| v as i32);
        self.maps.reset(self.volume.shape());
        self.maps.replace_mask(&mask)
    }

    pub fn replace_mask(&mut self, mask: &Array3<i32>) -> Result<()> { self.maps.replace_mask(mask) }

    /// Sum `masks` into a single mask and use it. With no masks the store is
    /// left alone.
    pub fn replace_masks(&mut self, masks: &[Array3<i32>]) -> Result<()> {
        match combine_masks(masks)? {
            Some(mask) => self.replace_mask(&mask),
            None       => Ok(()),
        }
    }

    pub fn chain(&self) -> Chain { Chain::new(&self.config, self.variant, self.volume.n_times()) }

    pub fn fit(
        &mut self,
        voxels  : &[Voxel],
        entry   : Entry,
        status  : impl FnMut(&str),
        cancel  : &CancelToken,
        parallel: bool,
    ) -> Result<RunReport> {
        let chain = self.chain();
        if parallel { chain.run_parallel(&self.volume, &mut self.maps, voxels, entry, status, cancel) }
        else        { chain.run         (&self.volume, &mut self.maps, voxels, entry, status, cancel) }
    }

    /// Fit every masked voxel
    pub fn fit_all(&mut self, status: impl FnMut(&str), cancel: &CancelToken, parallel: bool) -> Result<RunReport> {
        let voxels = self.maps.all_voxels();
        self.fit(&voxels, Entry::All, status, cancel, parallel)
    }

    /// Fit the masked voxels of slice `z`
    pub fn fit_slice(&mut self, z: usize, status: impl FnMut(&str), cancel: &CancelToken) -> Result<RunReport> {
        let voxels = self.maps.voxels_in_slice(z);
        self.fit(&voxels, Entry::Slice, status, cancel, false)
    }

    /// Model curve from the stored results of `voxel`, all zeros if it has
    /// not been fitted.
    pub fn fit_curve(&self, voxel: Voxel) -> Result<Vec<Intensity>> {
        let a = self.maps.params_for(&self.variant, voxel)?;
        if a.iter().all(|&x| x == 0.0) {
            return Ok(vec![0.0; self.volume.n_times()]);
        }
        self.variant.evaluate(&a, self.volume.time())
    }
}
