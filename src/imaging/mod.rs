//! Image processing: compositing, encoding and density metadata.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Crop / rotate / scale** | inverse mapping + bilinear sampling, Lanczos3 prefilter |
//! | **Encode** | `image` JPEG and PNG encoders |
//! | **Density** | custom JFIF APP0 / PNG `pHYs` patching |
//! | **Size budget** | quality ladder over the backend |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry math (unit testable)
//! - **Parameters**: Output format, quality and dimension types
//! - **Compositor**: Fixed-frame raster transform
//! - **Validate**: Dimension check against the target
//! - **Density**: Byte-level density embedding with CRC32
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Size-constrained encoding combining backend + density

pub mod backend;
mod calculations;
pub mod compositor;
pub mod density;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod validate;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{clamp_scale, cover_scale, normalize_rotation, preview_dimensions};
pub use compositor::{CompositeError, composite, preview, render_frame};
pub use density::{Density, DensityError, embed_density, read_density};
pub use operations::{EncodeError, EncodeSettings, EncodedImage, encode_bounded};
pub use params::{Dimensions, OutputFormat, Quality};
pub use rust_backend::{RustBackend, load_image};
pub use validate::{Validation, validate};
