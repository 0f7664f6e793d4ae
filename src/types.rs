pub type Intensity = f64;
pub type Time      = f64;
pub type Weight    = f64;

/// Spatial shape of a volume or result map, in storage order `[ny, nx, nz]`
pub type Shape3 = [usize; 3];

/// Position of one voxel in the spatial grid.
///
/// Volumes and maps are stored `(y, x, z[, t])`, but voxels are named
/// `(x, y, z)` everywhere outside of array indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Voxel {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Voxel {
    pub fn new(x: usize, y: usize, z: usize) -> Self { Self { x, y, z } }

    /// Index into a `(y, x, z)` array
    #[inline]
    pub fn yxz(self) -> [usize; 3] { [self.y, self.x, self.z] }

    pub fn is_inside(self, [ny, nx, nz]: Shape3) -> bool {
        self.x < nx && self.y < ny && self.z < nz
    }
}

impl From<(usize, usize, usize)> for Voxel {
    fn from((x, y, z): (usize, usize, usize)) -> Self { Self { x, y, z } }
}
