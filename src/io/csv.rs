//! Result maps as comma separated text

use std::io::Write;

use crate::maps::{MapName, ResultMaps};

/// One row per masked voxel, in fitting order, after a `Study UID` line and a
/// column header.
pub fn write_by_voxel(maps: &ResultMaps, study_uid: &str, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Study UID, {study_uid}")?;
    let header = MapName::ALL.iter().map(|n| n.name()).collect::<Vec<_>>().join(", ");
    writeln!(out, "X-voxel, Y-voxel, Z-voxel, {header}")?;
    for v in maps.all_voxels() {
        let mut row = vec![v.x.to_string(), v.y.to_string(), v.z.to_string()];
        row.extend(MapName::ALL.iter().map(|&n| maps.get(n)[v.yxz()].to_string()));
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

/// One row per `(x, y)` position with a `<Map>_<z>` column for every map and
/// slice. Values appear only where the mask equals `label`, `0` elsewhere, so
/// that differently labelled regions can be written to separate tables.
pub fn write_by_slice(maps: &ResultMaps, label: i32, study_uid: &str, out: &mut impl Write) -> std::io::Result<()> {
    let [ny, nx, nz] = maps.shape();
    writeln!(out, "{study_uid}")?;
    let columns = itertools::iproduct!(MapName::ALL.iter(), 0..nz)
        .map(|(name, z)| format!("{name}_{z}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "X-voxel, Y-voxel, {columns}")?;
    let mask = maps.get(MapName::Mask);
    for (y, x) in itertools::iproduct!(0..ny, 0..nx) {
        let mut row = vec![x.to_string(), y.to_string()];
        for (&name, z) in itertools::iproduct!(MapName::ALL.iter(), 0..nz) {
            if mask[[y, x, z]] == f64::from(label) { row.push(maps.get(name)[[y, x, z]].to_string()) }
            else                                   { row.push("0".into()) }
        }
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;
    use crate::types::Voxel;

    fn two_voxel_maps() -> ResultMaps {
        let mut maps = ResultMaps::new([1, 2, 1]);
        let mut mask = Array3::zeros((1, 2, 1));
        mask[[0, 1, 0]] = 5;
        maps.replace_mask(&mask).unwrap();
        maps.set_voxel(MapName::Peak, Voxel::new(1, 0, 0), 250.5).unwrap();
        maps.set_voxel(MapName::Peak, Voxel::new(0, 0, 0), 9.0).unwrap();
        maps
    }

    #[test]
    fn by_voxel() {
        let mut out = vec![];
        write_by_voxel(&two_voxel_maps(), "1.2.3", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\
Study UID, 1.2.3
X-voxel, Y-voxel, Z-voxel, Mask, Peak, R1, R2, Delay1, Delay2, Base, Chis, Badfit
1,0,0,5,250.5,0,0,0,0,0,0,0
");
    }

    #[test]
    fn by_slice_keeps_only_the_label() {
        let maps = two_voxel_maps();
        let mut out = vec![];
        write_by_slice(&maps, 5, "uid", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "uid");
        assert!(lines[1].starts_with("X-voxel, Y-voxel, Mask_0, Peak_0, R1_0"));
        assert_eq!(lines[2], "0,0,0,0,0,0,0,0,0,0,0");
        assert_eq!(lines[3], "1,0,5,250.5,0,0,0,0,0,0,0");

        let mut out = vec![];
        write_by_slice(&maps, 4, "uid", &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().lines().skip(2).all(|l| l.ends_with("0,0,0,0,0,0,0,0,0")));
    }
}
