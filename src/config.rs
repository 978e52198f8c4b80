use crate::frame::Rotation;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KnocklyConfig {
    pub device: DeviceConfig,
    pub serial: SerialConfig,
    pub camera: CameraConfig,
    pub recognition: RecognitionConfig,
    pub enrollment: EnrollmentConfig,
    pub mailbox: MailboxConfig,
    pub upload: UploadConfig,
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    /// Identifier of this doorbell in the encoding store
    #[serde(default = "default_doorbell_id")]
    pub doorbell_id: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bounded read timeout for telemetry lines
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Pause after every command so the microcontroller can process it
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Pause after the startup reset before the port is rediscovered
    #[serde(default = "default_reset_settle_ms")]
    pub reset_settle_ms: u64,

    /// Substrings matched against port names and descriptions
    #[serde(default = "default_signatures")]
    pub signatures: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (v4l2 source only)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// GStreamer source element family: "libcamera" or "v4l2"
    #[serde(default = "default_camera_source")]
    pub source: String,

    /// Mounting rotation applied to every captured frame
    #[serde(default = "default_camera_rotation")]
    pub rotation: Option<Rotation>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecognitionConfig {
    /// Shared window between two actuation/notification decisions
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Maximum encoding distance accepted by the match predicate
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Linear downscale factor applied before detection
    #[serde(default = "default_downscale")]
    pub downscale: u32,

    /// Pause between live iterations
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_ingest_dir")]
    pub ingest_dir: PathBuf,

    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Video file extension picked up from the ingestion directory
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// A file must keep its size over this window to count as uploaded
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,

    #[serde(default = "default_min_duration_seconds")]
    pub min_duration_seconds: f64,

    /// Minimum average luminance (0-255) of the first frame
    #[serde(default = "default_brightness_threshold")]
    pub brightness_threshold: f64,

    /// Cap on encodings stored per video
    #[serde(default = "default_max_encodings")]
    pub max_encodings: usize,

    /// Number of evenly spaced frames sampled per video
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MailboxConfig {
    #[serde(default = "default_mailbox_path")]
    pub path: PathBuf,

    #[serde(default = "default_mailbox_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_upload_enabled")]
    pub enabled: bool,

    #[serde(default = "default_upload_ip")]
    pub ip: String,

    #[serde(default = "default_upload_port")]
    pub port: u16,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// JSON-lines file holding one encoding record per line
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_base_url")]
    pub base_url: String,

    #[serde(default = "default_notify_endpoint")]
    pub endpoint: String,

    /// File holding this doorbell's relay token
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    #[serde(default = "default_notify_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Write annotated frames for local monitoring
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,

    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,

    /// TrueType font used for face labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log file appended alongside console output; empty disables it
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl KnocklyConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("knockly.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let defaults = Config::try_from(&KnocklyConfig::default())?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&path_str).required(false))
            // KNOCKLY_ENROLLMENT__MIN_DURATION_SECONDS=10
            .add_source(Environment::with_prefix("KNOCKLY").separator("__"))
            .build()?;

        let config: KnocklyConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.signatures.is_empty() {
            return Err(ConfigError::Message(
                "At least one serial device signature is required".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.recognition.downscale == 0 {
            return Err(ConfigError::Message(
                "Recognition downscale must be greater than 0".to_string(),
            ));
        }

        if self.recognition.tolerance <= 0.0 {
            return Err(ConfigError::Message(
                "Recognition tolerance must be positive".to_string(),
            ));
        }

        if self.enrollment.poll_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Enrollment poll_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.enrollment.stability_window_ms == 0 {
            return Err(ConfigError::Message(
                "Enrollment stability_window_ms must be greater than 0".to_string(),
            ));
        }

        if self.enrollment.max_encodings == 0 || self.enrollment.sample_count == 0 {
            return Err(ConfigError::Message(
                "Enrollment max_encodings and sample_count must be greater than 0".to_string(),
            ));
        }

        if self.enrollment.ingest_dir == self.enrollment.processed_dir {
            return Err(ConfigError::Message(
                "Ingest and processed directories must differ".to_string(),
            ));
        }

        if self.mailbox.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Mailbox poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }
}

impl RecognitionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl EnrollmentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }
}

impl Default for KnocklyConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                doorbell_id: default_doorbell_id(),
            },
            serial: SerialConfig {
                baud_rate: default_baud_rate(),
                read_timeout_ms: default_read_timeout_ms(),
                settle_ms: default_settle_ms(),
                reset_settle_ms: default_reset_settle_ms(),
                signatures: default_signatures(),
            },
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                source: default_camera_source(),
                rotation: default_camera_rotation(),
            },
            recognition: RecognitionConfig {
                cooldown_seconds: default_cooldown_seconds(),
                tolerance: default_tolerance(),
                downscale: default_downscale(),
                idle_sleep_ms: default_idle_sleep_ms(),
            },
            enrollment: EnrollmentConfig {
                ingest_dir: default_ingest_dir(),
                processed_dir: default_processed_dir(),
                extension: default_extension(),
                poll_interval_seconds: default_poll_interval_seconds(),
                stability_window_ms: default_stability_window_ms(),
                min_duration_seconds: default_min_duration_seconds(),
                brightness_threshold: default_brightness_threshold(),
                max_encodings: default_max_encodings(),
                sample_count: default_sample_count(),
            },
            mailbox: MailboxConfig {
                path: default_mailbox_path(),
                poll_interval_ms: default_mailbox_poll_interval_ms(),
            },
            upload: UploadConfig {
                enabled: default_upload_enabled(),
                ip: default_upload_ip(),
                port: default_upload_port(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            store: StoreConfig {
                path: default_store_path(),
            },
            notify: NotifyConfig {
                base_url: default_notify_base_url(),
                endpoint: default_notify_endpoint(),
                token_path: default_token_path(),
                timeout_seconds: default_notify_timeout_seconds(),
            },
            display: DisplayConfig {
                enabled: default_display_enabled(),
                snapshot_path: default_snapshot_path(),
                snapshot_interval_ms: default_snapshot_interval_ms(),
                font_path: default_font_path(),
                font_size: default_font_size(),
            },
            logging: LoggingConfig {
                file: default_log_file(),
            },
        }
    }
}

// Default value functions
fn default_doorbell_id() -> u32 {
    1
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_settle_ms() -> u64 {
    50
}
fn default_reset_settle_ms() -> u64 {
    2000
}
fn default_signatures() -> Vec<String> {
    vec![
        "Arduino".to_string(),
        "ttyACM".to_string(),
        "ttyUSB".to_string(),
    ]
}

fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    15
}
fn default_camera_source() -> String {
    "libcamera".to_string()
}
fn default_camera_rotation() -> Option<Rotation> {
    Some(Rotation::Rotate180)
}

fn default_cooldown_seconds() -> u64 {
    5
}
fn default_tolerance() -> f32 {
    0.6
}
fn default_downscale() -> u32 {
    4
}
fn default_idle_sleep_ms() -> u64 {
    10
}

fn default_ingest_dir() -> PathBuf {
    PathBuf::from("ftp_videos")
}
fn default_processed_dir() -> PathBuf {
    PathBuf::from("processed_videos")
}
fn default_extension() -> String {
    "mp4".to_string()
}
fn default_poll_interval_seconds() -> u64 {
    5
}
fn default_stability_window_ms() -> u64 {
    1000
}
fn default_min_duration_seconds() -> f64 {
    15.0
}
fn default_brightness_threshold() -> f64 {
    32.0
}
fn default_max_encodings() -> usize {
    20
}
fn default_sample_count() -> usize {
    20
}

fn default_mailbox_path() -> PathBuf {
    PathBuf::from("command.txt")
}
fn default_mailbox_poll_interval_ms() -> u64 {
    100
}

fn default_upload_enabled() -> bool {
    true
}
fn default_upload_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_upload_port() -> u16 {
    2121
}
fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_store_path() -> PathBuf {
    PathBuf::from("face_encodings.jsonl")
}

fn default_notify_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_notify_endpoint() -> String {
    "/notifications/notify/motionDetected".to_string()
}
fn default_token_path() -> PathBuf {
    PathBuf::from("/home/admin/.doorbell_id_token.txt")
}
fn default_notify_timeout_seconds() -> u64 {
    10
}

fn default_display_enabled() -> bool {
    false
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("live_feed.jpg")
}
fn default_snapshot_interval_ms() -> u64 {
    1000
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    18.0
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("log.txt"))
}
