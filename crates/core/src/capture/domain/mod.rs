pub mod face_image_store;
pub mod frame_source;
