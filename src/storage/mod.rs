pub mod client;
pub mod types;

pub use client::{delete_images_settled, CloudinaryClient, DeletionReport, ImageStore};
pub use types::{extract_public_id, transform_url, UploadedImage};
