pub mod api;
pub mod core;

pub use api::config::{BackendConfig, DetectorConfig};
pub use api::models::{DetectionApiError, DetectionOutcome, DetectionReport};
pub use api::video::VideoDetector;
pub use core::analysis::{CancellationToken, Progress};

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("ai_video_detector"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // already initialized by the host is fine
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
