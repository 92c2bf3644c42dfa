/// Identity used as `sender` on the bus unless configured otherwise.
pub const DEFAULT_IDENTITY: &str = "faceinator";
pub const DEFAULT_VERSION: &str = "v0.1.0";

pub const DEFAULT_INBOUND_TOPIC: &str = "alch/faceinator";
pub const DEFAULT_STATUS_TOPIC: &str = "alch";
pub const DEFAULT_GAME_TOPIC: &str = "alch";

/// Output id carrying the game-start switch and the reported session phase.
pub const GAME_START_ID: i64 = 1;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Laplacian variance at or below which a face crop counts as blurry.
pub const DEFAULT_SHARPNESS_THRESHOLD: f64 = 100.0;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_NMS_IOU: f64 = 0.4;

/// Pixels added around each detected face before cropping.
pub const DEFAULT_FACE_PADDING: i32 = 20;

pub const FACE_IMAGE_PREFIX: &str = "face_";
pub const FACE_IMAGE_EXTENSION: &str = "jpg";

/// Exit status of the detection process when the camera cannot deliver frames.
pub const EXIT_CAMERA_UNAVAILABLE: i32 = 3;
