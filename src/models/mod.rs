pub mod image;
pub mod titan;
pub mod usage;

pub use image::*;
pub use titan::*;
pub use usage::*;
