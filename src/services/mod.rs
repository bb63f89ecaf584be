mod alert;

pub use alert::{AlertSignal, SimulatedAlertSignal, ALERT_BURST_TARGET};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::wizard::error::{Result, SetupError};

/// Persistent key-value configuration behind the app.
///
/// The collection store piggybacks here because its only interaction with
/// the setup flow is the idempotent one-time initialization at commit.
pub trait ConfigStore: Send + Sync {
    fn is_app_configured(&self) -> bool;
    fn is_organization_managed(&self) -> bool;
    fn is_license_accepted(&self) -> bool;

    fn is_reconfig_requested(&self) -> bool;
    fn set_reconfig_requested(&self, requested: bool);

    fn mark_setup_complete(&self);

    fn organization_name(&self) -> Option<String>;
    fn set_organization_name(&self, name: &str);

    fn admin_password_hash(&self) -> Option<String>;
    fn set_admin_password_hash(&self, hash: &str);

    /// One-time collection initialization. Calling it again returns
    /// [`SetupError::CollectionAlreadyInitialized`].
    fn setup_collection(&self) -> Result<()>;
}

/// Root-detection check.
pub trait RootCheck: Send + Sync {
    fn is_device_rooted(&self) -> bool;
}

/// Connectivity check, consulted before network-dependent step jobs.
pub trait Connectivity: Send + Sync {
    fn is_internet_connected(&self) -> bool;
}

/// Blocking language-pack download. Run under `spawn_blocking` by the
/// wizard controller; implementations are expected to run to completion.
pub trait FeatureDownload: Send + Sync {
    fn download(&self, source_language: &str, target_language: &str) -> Result<()>;
}

/// Tears down and relaunches the host application shell.
pub trait Restart: Send + Sync {
    fn restart_app(&self);
}

/// The capability bundle handed to the screen gate and wizard controller.
#[derive(Clone)]
pub struct DeviceServices {
    pub config: Arc<dyn ConfigStore>,
    pub root: Arc<dyn RootCheck>,
    pub connectivity: Arc<dyn Connectivity>,
    pub downloads: Arc<dyn FeatureDownload>,
    pub restart: Arc<dyn Restart>,
    pub alert: Arc<dyn AlertSignal>,
}

impl DeviceServices {
    /// Service bundle backed by a single in-memory device, for the demo
    /// harness and tests. The returned handle exposes the simulation knobs.
    pub fn simulated() -> (Self, Arc<SimulatedDevice>) {
        let device = Arc::new(SimulatedDevice::default());
        let alert = Arc::new(SimulatedAlertSignal::new());
        let services = Self {
            config: device.clone(),
            root: device.clone(),
            connectivity: device.clone(),
            downloads: device.clone(),
            restart: device.clone(),
            alert,
        };
        (services, device)
    }
}

/// In-memory device state implementing every collaborator trait, in the
/// manner of a dryrun service: no real system is touched, every mutation
/// is recorded so tests can assert on it.
#[derive(Debug)]
pub struct SimulatedDevice {
    configured: AtomicBool,
    managed: AtomicBool,
    license_accepted: AtomicBool,
    reconfig_requested: AtomicBool,
    rooted: AtomicBool,
    connected: AtomicBool,
    collection_initialized: AtomicBool,
    org_name: Mutex<Option<String>>,
    admin_hash: Mutex<Option<String>>,
    // Number of upcoming downloads that should fail.
    download_failures: AtomicUsize,
    downloads_attempted: AtomicUsize,
    restarts_requested: AtomicUsize,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self {
            configured: AtomicBool::new(false),
            managed: AtomicBool::new(false),
            license_accepted: AtomicBool::new(true),
            reconfig_requested: AtomicBool::new(false),
            rooted: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            collection_initialized: AtomicBool::new(false),
            org_name: Mutex::new(None),
            admin_hash: Mutex::new(None),
            download_failures: AtomicUsize::new(0),
            downloads_attempted: AtomicUsize::new(0),
            restarts_requested: AtomicUsize::new(0),
        }
    }
}

impl SimulatedDevice {
    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    pub fn set_managed(&self, managed: bool) {
        self.managed.store(managed, Ordering::SeqCst);
    }

    pub fn set_license_accepted(&self, accepted: bool) {
        self.license_accepted.store(accepted, Ordering::SeqCst);
    }

    pub fn set_rooted(&self, rooted: bool) {
        self.rooted.store(rooted, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `count` downloads fail, then succeed again.
    pub fn fail_next_downloads(&self, count: usize) {
        self.download_failures.store(count, Ordering::SeqCst);
    }

    pub fn downloads_attempted(&self) -> usize {
        self.downloads_attempted.load(Ordering::SeqCst)
    }

    pub fn restarts_requested(&self) -> usize {
        self.restarts_requested.load(Ordering::SeqCst)
    }
}

impl ConfigStore for SimulatedDevice {
    fn is_app_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn is_organization_managed(&self) -> bool {
        self.managed.load(Ordering::SeqCst)
    }

    fn is_license_accepted(&self) -> bool {
        self.license_accepted.load(Ordering::SeqCst)
    }

    fn is_reconfig_requested(&self) -> bool {
        self.reconfig_requested.load(Ordering::SeqCst)
    }

    fn set_reconfig_requested(&self, requested: bool) {
        self.reconfig_requested.store(requested, Ordering::SeqCst);
    }

    fn mark_setup_complete(&self) {
        info!("marking setup as complete");
        self.configured.store(true, Ordering::SeqCst);
    }

    fn organization_name(&self) -> Option<String> {
        self.org_name.lock().unwrap().clone()
    }

    fn set_organization_name(&self, name: &str) {
        info!("setting organization name: {}", name);
        *self.org_name.lock().unwrap() = Some(name.to_string());
        self.managed.store(true, Ordering::SeqCst);
    }

    fn admin_password_hash(&self) -> Option<String> {
        self.admin_hash.lock().unwrap().clone()
    }

    fn set_admin_password_hash(&self, hash: &str) {
        debug!("storing admin password hash");
        *self.admin_hash.lock().unwrap() = Some(hash.to_string());
    }

    fn setup_collection(&self) -> Result<()> {
        if self.collection_initialized.swap(true, Ordering::SeqCst) {
            return Err(SetupError::CollectionAlreadyInitialized);
        }
        info!("collection store initialized");
        Ok(())
    }
}

impl RootCheck for SimulatedDevice {
    fn is_device_rooted(&self) -> bool {
        self.rooted.load(Ordering::SeqCst)
    }
}

impl Connectivity for SimulatedDevice {
    fn is_internet_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl FeatureDownload for SimulatedDevice {
    fn download(&self, source_language: &str, target_language: &str) -> Result<()> {
        self.downloads_attempted.fetch_add(1, Ordering::SeqCst);

        let remaining = self.download_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.download_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SetupError::JobFailed(format!(
                "language pack {source_language}->{target_language} download failed"
            )));
        }

        info!(
            "downloaded language pack {}->{}",
            source_language, target_language
        );
        Ok(())
    }
}

impl Restart for SimulatedDevice {
    fn restart_app(&self) {
        info!("app restart requested");
        self.restarts_requested.fetch_add(1, Ordering::SeqCst);
    }
}
