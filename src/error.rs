use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnocklyError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Hardware link error: {0}")]
    Link(#[from] LinkError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Video validation error: {0}")]
    Validation(#[from] VideoValidationError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Encoding store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Upload service error: {0}")]
    Upload(#[from] UploadError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl KnocklyError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Only a missing actuator link is fatal; everything else is isolated
    /// to the asset, frame or tick that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KnocklyError::Link(LinkError::DeviceNotFound { .. }))
    }
}

/// Serial link failures
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial I/O failed during {operation}: {source}")]
    HardwareIo {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("No serial device matching {signatures:?} was found")]
    DeviceNotFound { signatures: Vec<String> },

    #[error("Failed to open serial port {port}: {details}")]
    Open { port: String, details: String },

    #[error("Serial worker task failed: {details}")]
    Worker { details: String },
}

/// Camera capture failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Camera capture failed: {details}")]
    Capture { details: String },

    #[error("Camera is not running")]
    NotRunning,
}

/// Failures inside the face detection/encoding primitive
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Face detection failed: {details}")]
    Detection { details: String },

    #[error("Face encoding failed: {details}")]
    Encoding { details: String },

    #[error("Recognition worker task failed: {details}")]
    Worker { details: String },
}

/// Reasons an uploaded video is refused before extraction
#[derive(Error, Debug)]
pub enum VideoValidationError {
    #[error("Could not open video: {details}")]
    Unreadable { details: String },

    #[error("Video too short ({duration_seconds:.1}s, minimum {minimum_seconds:.1}s)")]
    TooShort {
        duration_seconds: f64,
        minimum_seconds: f64,
    },

    #[error("Video too dark (average brightness {brightness:.1}, minimum {threshold:.1})")]
    TooDark { brightness: f64, threshold: f64 },

    #[error("Could not read first frame: {details}")]
    NoFrames { details: String },
}

/// Failure on a single sampled frame
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Bad frame at {index}: {details}")]
    FrameRead { index: u64, details: String },

    #[error("Recognition failed on frame {index}: {source}")]
    Recognition {
        index: u64,
        #[source]
        source: RecognitionError,
    },
}

/// Encoding store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to store encoding for {label}: {details}")]
    Write { label: String, details: String },

    #[error("Failed to read encodings: {details}")]
    Read { details: String },
}

/// Command mailbox failures
#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Unrecognized command {content:?}")]
    Parse { content: String },

    #[error("Mailbox I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Notification relay failures
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification token not found at {path}")]
    TokenMissing { path: String },

    #[error("Notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification rejected with status {status}: {reason}")]
    Status { status: u16, reason: String },
}

/// Upload service failures
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to bind upload service to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload service stopped: {details}")]
    Server { details: String },
}

pub type Result<T> = std::result::Result<T, KnocklyError>;
