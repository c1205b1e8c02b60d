pub mod image;

pub use image::{storage_key_for, ImageRecord};
