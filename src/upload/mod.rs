pub mod drive;

pub use drive::DriveUploader;
