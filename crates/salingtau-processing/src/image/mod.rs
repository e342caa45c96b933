//! Profile picture and course thumbnail processing

mod consumer;
pub mod transform;

pub use consumer::{ImageJobConsumer, ImageSettings};
pub use transform::{
    decode, detect_image_type, encode_avif, render_square, square_crop_region, CropRegion,
    DetectedImage,
};
