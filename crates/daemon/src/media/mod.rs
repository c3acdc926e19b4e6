pub mod ffmpeg;
pub mod filters;

pub use ffmpeg::FfmpegOperations;
