//! Biometric quick-unlock: device probing and the credential gate

pub mod gate;
pub mod probe;

pub use gate::{
    BiometricGate, CREDENTIALS_KEY, ENABLED_KEY, EnableError, FeatureFlagSource, LAST_AUTH_KEY,
    QuickUnlockError, StaticFlags, StoredCredential,
};
pub use probe::{
    BiometricCapability, BiometricKind, BiometricProbe, ChallengeError, MockProbe, Platform,
    ProbeError, kind_icon, kind_label, probe_capability,
};
