//! Target locations for kriging runs

mod geotransform;
mod target;

pub use geotransform::GeoTransform;
pub use target::TargetGrid;
