//! Device biometric probe - capability queries and user-presence challenges

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Types
// ============================================================================

/// Biometric challenge kinds a device may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    Face,
    Fingerprint,
    Iris,
}

/// Platform family, used only for human-readable labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    #[default]
    Android,
}

/// Platform probe failure
///
/// Only surfaced by the raw probe trait; capability probing degrades this
/// into a `hardware_present = false` record with a diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Platform probe failure: {0}")]
pub struct ProbeError(pub String);

/// Why a biometric challenge did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// No biometric hardware usable right now
    #[error("Biometric authentication is not available on this device")]
    NotAvailable,

    /// Hardware present but nothing enrolled
    #[error("No biometrics enrolled. Please set up biometrics in your device settings.")]
    NotEnrolled,

    /// The user dismissed the prompt; not an error condition for the UI
    #[error("Authentication was canceled")]
    UserCanceled,

    /// The platform reported a failure
    #[error("Platform error: {0}")]
    Platform(String),
}

/// Live device capability snapshot; recomputed on demand, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct BiometricCapability {
    pub hardware_present: bool,
    pub enrolled: bool,
    pub supported_kinds: Vec<BiometricKind>,
    /// Human-readable challenge type; present whenever hardware is
    pub label: Option<String>,
    /// UI icon hint for the preferred kind
    pub icon: &'static str,
    /// Whether biometric login is administratively enabled
    pub feature_admin_enabled: bool,
    /// Probe-level failure detail, when the probe itself misbehaved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl BiometricCapability {
    /// Whether quick-unlock could be enabled right now
    pub fn usable(&self) -> bool {
        self.hardware_present && self.enrolled && self.feature_admin_enabled
    }
}

// ============================================================================
// Probe Trait
// ============================================================================

/// Platform biometric primitive
#[async_trait]
pub trait BiometricProbe: Send + Sync {
    /// Whether the device has biometric hardware
    async fn hardware_present(&self) -> Result<bool, ProbeError>;

    /// Whether the user has enrolled at least one biometric factor
    async fn enrolled(&self) -> Result<bool, ProbeError>;

    /// Challenge kinds the hardware supports
    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>, ProbeError>;

    /// The platform family, for label policy
    fn platform(&self) -> Platform;

    /// Issue exactly one platform challenge with a localized prompt
    async fn challenge(&self, prompt: &str, cancel_label: &str) -> Result<(), ChallengeError>;
}

/// Query the probe into a capability record
///
/// Probe-level errors never propagate: they degrade into
/// `hardware_present = false` with the failure attached as a diagnostic.
pub async fn probe_capability(
    probe: &dyn BiometricProbe,
    feature_admin_enabled: bool,
) -> BiometricCapability {
    let probed = async {
        let hardware = probe.hardware_present().await?;
        if !hardware {
            return Ok((false, false, Vec::new()));
        }
        let kinds = probe.supported_kinds().await?;
        let enrolled = probe.enrolled().await?;
        Ok::<_, ProbeError>((true, enrolled, kinds))
    }
    .await;

    match probed {
        Ok((hardware_present, enrolled, supported_kinds)) => {
            let label = hardware_present
                .then(|| kind_label(probe.platform(), &supported_kinds).to_string());
            let icon = kind_icon(&supported_kinds);
            BiometricCapability {
                hardware_present,
                enrolled,
                supported_kinds,
                label,
                icon,
                feature_admin_enabled,
                diagnostic: None,
            }
        }
        Err(e) => {
            tracing::warn!("Biometric capability probe failed: {}", e);
            BiometricCapability {
                hardware_present: false,
                enrolled: false,
                supported_kinds: Vec::new(),
                label: None,
                icon: "lock",
                feature_admin_enabled,
                diagnostic: Some(e.0),
            }
        }
    }
}

/// Human-readable label for the preferred supported kind
///
/// Face-class is preferred over fingerprint over iris; an empty kind list
/// still labels as generic "Biometric".
pub fn kind_label(platform: Platform, kinds: &[BiometricKind]) -> &'static str {
    if kinds.contains(&BiometricKind::Face) {
        match platform {
            Platform::Ios => "Face ID",
            Platform::Android => "Face Recognition",
        }
    } else if kinds.contains(&BiometricKind::Fingerprint) {
        match platform {
            Platform::Ios => "Touch ID",
            Platform::Android => "Fingerprint",
        }
    } else if kinds.contains(&BiometricKind::Iris) {
        "Iris"
    } else {
        "Biometric"
    }
}

/// UI icon hint for the preferred supported kind
pub fn kind_icon(kinds: &[BiometricKind]) -> &'static str {
    if kinds.contains(&BiometricKind::Face) {
        "face"
    } else if kinds.contains(&BiometricKind::Fingerprint) {
        "fingerprint"
    } else if kinds.contains(&BiometricKind::Iris) {
        "visibility"
    } else {
        "lock"
    }
}

// ============================================================================
// MockProbe - scriptable probe for tests and development
// ============================================================================

/// Scriptable probe
///
/// Challenge outcomes can be queued; with an empty queue a challenge
/// succeeds whenever hardware is present and enrolled.
#[derive(Clone)]
pub struct MockProbe {
    inner: Arc<MockProbeInner>,
}

struct MockProbeInner {
    hardware: bool,
    enrolled: bool,
    kinds: Vec<BiometricKind>,
    platform: Platform,
    failure: Option<String>,
    outcomes: Mutex<VecDeque<Result<(), ChallengeError>>>,
    challenges: AtomicUsize,
}

impl MockProbe {
    /// A device with the given kinds, hardware present and enrolled
    pub fn available(kinds: Vec<BiometricKind>) -> Self {
        Self::new(true, true, kinds)
    }

    /// A device with explicit hardware/enrollment state
    pub fn new(hardware: bool, enrolled: bool, kinds: Vec<BiometricKind>) -> Self {
        Self {
            inner: Arc::new(MockProbeInner {
                hardware,
                enrolled,
                kinds,
                platform: Platform::default(),
                failure: None,
                outcomes: Mutex::new(VecDeque::new()),
                challenges: AtomicUsize::new(0),
            }),
        }
    }

    /// A probe whose every query fails at the platform level
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MockProbeInner {
                hardware: false,
                enrolled: false,
                kinds: Vec::new(),
                platform: Platform::default(),
                failure: Some(message.into()),
                outcomes: Mutex::new(VecDeque::new()),
                challenges: AtomicUsize::new(0),
            }),
        }
    }

    /// Set the platform family
    pub fn with_platform(mut self, platform: Platform) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("probe already shared");
        inner.platform = platform;
        self
    }

    /// Queue the outcome of the next challenge
    pub fn push_outcome(&self, outcome: Result<(), ChallengeError>) {
        self.inner
            .outcomes
            .lock()
            .expect("outcome queue poisoned")
            .push_back(outcome);
    }

    /// Number of challenges issued so far
    pub fn challenge_count(&self) -> usize {
        self.inner.challenges.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProbeError> {
        match &self.inner.failure {
            Some(msg) => Err(ProbeError(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BiometricProbe for MockProbe {
    async fn hardware_present(&self) -> Result<bool, ProbeError> {
        self.check()?;
        Ok(self.inner.hardware)
    }

    async fn enrolled(&self) -> Result<bool, ProbeError> {
        self.check()?;
        Ok(self.inner.enrolled)
    }

    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>, ProbeError> {
        self.check()?;
        Ok(self.inner.kinds.clone())
    }

    fn platform(&self) -> Platform {
        self.inner.platform
    }

    async fn challenge(&self, _prompt: &str, _cancel_label: &str) -> Result<(), ChallengeError> {
        self.inner.challenges.fetch_add(1, Ordering::SeqCst);

        if !self.inner.hardware {
            return Err(ChallengeError::NotAvailable);
        }
        if !self.inner.enrolled {
            return Err(ChallengeError::NotEnrolled);
        }

        self.inner
            .outcomes
            .lock()
            .expect("outcome queue poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
