pub mod face_record;
pub mod quality_gate;
pub mod sharpness;
