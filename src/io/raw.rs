/// Read / write volumes, masks and result maps as raw little-endian `f32`
///
/// Files hold `x` fastest, then `y`, then `z`, then (for volumes) `t`.

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4};

use crate::{Error, Result};
use crate::maps::{MapName, ResultMaps};
use crate::types::Intensity;

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

type IORes<T> = std::io::Result<T>;
pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; 4];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(f32::from_le_bytes(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

fn read_exactly(path: &Path, expected: usize) -> Result<Vec<f32>> {
    let data = read(path)?.collect::<IORes<Vec<_>>>()?;
    if data.len() != expected {
        return Err(Error::Volume(format!("{} holds {} values, expected {expected}", path.display(), data.len())));
    }
    Ok(data)
}

/// Volume of `nx * ny * nz * nt` values, returned in `(y, x, z, t)` order
pub fn read_volume(path: &Path, (nx, ny, nz, nt): (usize, usize, usize, usize)) -> Result<Array4<Intensity>> {
    let data = read_exactly(path, nx * ny * nz * nt)?;
    let data = Array4::from_shape_vec((nt, nz, ny, nx), data.into_iter().map(f64::from).collect())
        .map_err(|e| Error::Volume(e.to_string()))?;
    Ok(data.permuted_axes([2, 3, 1, 0]).as_standard_layout().into_owned())
}

/// Mask of `nx * ny * nz` values, rounded to integer labels, in `(y, x, z)` order
pub fn read_mask(path: &Path, (nx, ny, nz): (usize, usize, usize)) -> Result<Array3<i32>> {
    let data = read_exactly(path, nx * ny * nz)?;
    let mask = Array3::from_shape_vec((nz, ny, nx), data.into_iter().map(|v| v.round() as i32).collect())
        .map_err(|e| Error::Volume(e.to_string()))?;
    Ok(mask.permuted_axes([1, 2, 0]).as_standard_layout().into_owned())
}

/// One `(y, x, z)` map, written `x` fastest
pub fn write_map(map: &Array3<f64>, path: &Path) -> std::io::Result<()> {
    let zyx = map.view().permuted_axes([2, 0, 1]);
    write(zyx.iter().map(|&v| v as f32), path)
}

/// Every result map into `directory`, as `<stem>_<Map>.raw`
pub fn write_maps(maps: &ResultMaps, directory: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    MapName::ALL.iter()
        .map(|&name| {
            let path = directory.join(format!("{stem}_{name}.raw"));
            write_map(maps.get(name), &path)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use crate::types::Voxel;

    #[test]
    fn volume_is_read_x_fastest() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("volume.raw");
        // nx = 3, ny = 2, nz = 1, nt = 2: value = 100 t + 10 y + x
        let values = (0..2).flat_map(|t| (0..2).flat_map(move |y| (0..3).map(move |x| (100 * t + 10 * y + x) as f32)));
        write(values, &path)?;
        let volume = read_volume(&path, (3, 2, 1, 2))?;
        assert_eq!(volume.dim(), (2, 3, 1, 2));
        assert_eq!(volume[[1, 2, 0, 1]], 112.0);
        assert_eq!(volume[[0, 1, 0, 0]], 1.0);
        assert!(matches!(read_volume(&path, (3, 2, 2, 2)), Err(Error::Volume(_))));
        Ok(())
    }

    #[test]
    fn maps_and_masks_share_layout() -> Result<()> {
        let dir = tempdir()?;
        let mut maps = ResultMaps::new([2, 3, 2]);
        maps.set_voxel(MapName::Mask, Voxel::new(2, 1, 1), 4.0)?;
        let written = write_maps(&maps, dir.path(), "fit")?;
        assert_eq!(written.len(), 9);
        assert!(written[0].ends_with("fit_Mask.raw"));

        let mask = read_mask(&written[0], (3, 2, 2))?;
        assert_eq!(mask.dim(), (2, 3, 2));
        assert_eq!(mask[[1, 2, 1]], 4);
        assert_eq!(mask.sum(), 4 + 11);
        Ok(())
    }
}
