use super::types::{ComponentState, ShutdownReason};
use crate::camera::{CameraInterface, FrameSource};
use crate::config::KnocklyConfig;
use crate::enrollment::{GstVideoDecoder, VideoDecoder};
use crate::error::Result;
use crate::events::EventBus;
use crate::hardware::{HardwareLink, SerialConnector, SerialportConnector};
use crate::keyboard_input::KeyboardInputHandler;
use crate::mailbox::{FileMailbox, Mailbox};
use crate::notify::{HttpNotifier, Notifier};
use crate::recognition::{
    EuclideanComparator, FaceComparator, FaceEngine, NullFaceEngine, RecognitionGateway,
};
use crate::store::{EncodingStore, FileEncodingStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The capabilities the daemon is assembled from
pub struct Components {
    pub camera: Arc<dyn FrameSource>,
    pub connector: Arc<dyn SerialConnector>,
    pub engine: Box<dyn FaceEngine>,
    pub comparator: Arc<dyn FaceComparator>,
    pub store: Arc<dyn EncodingStore>,
    pub decoder: Arc<dyn VideoDecoder>,
    pub mailbox: Arc<dyn Mailbox>,
    pub notifier: Arc<dyn Notifier>,
}

impl Components {
    /// Real devices and on-disk state as described by the configuration
    pub async fn from_config(config: &KnocklyConfig) -> Result<Self> {
        let camera = CameraInterface::new(config.camera.clone()).await?;
        let notifier = HttpNotifier::new(&config.notify)?;

        Ok(Self {
            camera: Arc::new(camera),
            connector: Arc::new(SerialportConnector::new(config.serial.clone())),
            engine: Box::new(NullFaceEngine::default()),
            comparator: Arc::new(EuclideanComparator::new(config.recognition.tolerance)),
            store: Arc::new(FileEncodingStore::new(&config.store.path)),
            decoder: Arc::new(GstVideoDecoder::new()),
            mailbox: Arc::new(FileMailbox::new(&config.mailbox.path)),
            notifier: Arc::new(notifier),
        })
    }
}

/// Main application coordinator that owns every task's lifecycle
pub struct KnocklyOrchestrator {
    pub(super) config: KnocklyConfig,
    pub(super) event_bus: Arc<EventBus>,

    pub(super) camera: Arc<dyn FrameSource>,
    pub(super) connector: Arc<dyn SerialConnector>,
    pub(super) gateway: RecognitionGateway,
    pub(super) comparator: Arc<dyn FaceComparator>,
    pub(super) store: Arc<dyn EncodingStore>,
    pub(super) decoder: Arc<dyn VideoDecoder>,
    pub(super) mailbox: Arc<dyn Mailbox>,
    pub(super) notifier: Arc<dyn Notifier>,

    /// Opened during `start`
    pub(super) link: Option<Arc<HardwareLink>>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) tasks: Vec<(&'static str, JoinHandle<()>)>,
    pub(super) event_logger: Option<JoinHandle<()>>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl KnocklyOrchestrator {
    pub fn new(config: KnocklyConfig, components: Components) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let keyboard_handler = Some(KeyboardInputHandler::new(Arc::clone(&event_bus)));

        Self {
            config,
            event_bus,
            camera: components.camera,
            connector: components.connector,
            gateway: RecognitionGateway::new(components.engine),
            comparator: components.comparator,
            store: components.store,
            decoder: components.decoder,
            mailbox: components.mailbox,
            notifier: components.notifier,
            link: None,
            keyboard_handler,
            keyboard_enabled: false,
            tasks: Vec::new(),
            event_logger: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Enable or disable the keyboard input handler
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &KnocklyConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// The microcontroller link, once `start` has opened it
    pub fn link(&self) -> Option<Arc<HardwareLink>> {
        self.link.clone()
    }
}
