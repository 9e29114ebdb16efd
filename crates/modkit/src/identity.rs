// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device unique identifier.
//!
//! Format: `<prefix>-<platform>-<12 lowercase hex>`, e.g.
//! `modkit-esp32-a4cf12b0c3d1`. The six id bytes come from an [`IdSource`]:
//! a MAC address on targets that have one, a persisted random id on targets
//! that only have non-volatile storage, or a throwaway random id on host.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default id prefix.
pub const DEFAULT_PREFIX: &str = "modkit";

/// Number of id bytes.
pub const ID_LEN: usize = 6;

/// Platform-specific provider of raw id bytes.
pub trait IdSource: Send + Sync {
    /// Short platform tag (`esp32`, `avr`, `host`, ...).
    fn platform(&self) -> &str;

    /// The id bytes. Called at most once per [`DeviceIdentity`].
    fn id_bytes(&self) -> [u8; ID_LEN];
}

/// Fixed bytes, for targets that read a MAC address up front and for tests.
#[derive(Debug, Clone)]
pub struct FixedIdSource {
    platform: String,
    bytes: [u8; ID_LEN],
}

impl FixedIdSource {
    pub fn new(platform: impl Into<String>, bytes: [u8; ID_LEN]) -> Self {
        Self {
            platform: platform.into(),
            bytes,
        }
    }
}

impl IdSource for FixedIdSource {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn id_bytes(&self) -> [u8; ID_LEN] {
        self.bytes
    }
}

/// Non-persistent random id; changes on every run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn platform(&self) -> &str {
        "host"
    }

    fn id_bytes(&self) -> [u8; ID_LEN] {
        random_bytes()
    }
}

/// Random id generated once and kept in a file across runs.
///
/// The file holds the 12 hex digits. A missing or unreadable file is
/// replaced by a fresh id; a failed write only costs persistence.
#[derive(Debug, Clone)]
pub struct FileIdSource {
    platform: String,
    path: PathBuf,
}

impl FileIdSource {
    pub fn new(platform: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            platform: platform.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Option<[u8; ID_LEN]> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        parse_hex_id(text.trim())
    }
}

impl IdSource for FileIdSource {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn id_bytes(&self) -> [u8; ID_LEN] {
        if let Some(bytes) = self.load() {
            return bytes;
        }

        let bytes = random_bytes();
        if let Err(e) = std::fs::write(&self.path, hex(&bytes)) {
            tracing::warn!(
                "Could not persist device id to {}: {}",
                self.path.display(),
                e
            );
        }
        bytes
    }
}

/// Lazily generated, cached device id.
pub struct DeviceIdentity {
    source: Box<dyn IdSource>,
    prefix: String,
    id: OnceLock<String>,
}

impl DeviceIdentity {
    pub fn new(source: impl IdSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            prefix: DEFAULT_PREFIX.to_string(),
            id: OnceLock::new(),
        }
    }

    /// Replace the `modkit` prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The id string; generated on first call, identical afterwards.
    pub fn unique_id(&self) -> &str {
        self.id.get_or_init(|| {
            let id = format!(
                "{}-{}-{}",
                self.prefix,
                self.source.platform(),
                hex(&self.source.id_bytes())
            );
            tracing::info!(device_id = %id, "device identity generated");
            id
        })
    }
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("prefix", &self.prefix)
            .field("id", &self.id.get())
            .finish_non_exhaustive()
    }
}

fn random_bytes() -> [u8; ID_LEN] {
    let mut bytes = [0u8; ID_LEN];
    bytes.iter_mut().for_each(|b| *b = fastrand::u8(..));
    bytes
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

fn parse_hex_id(text: &str) -> Option<[u8; ID_LEN]> {
    if text.len() != ID_LEN * 2 || !text.is_ascii() {
        return None;
    }
    let mut bytes = [0u8; ID_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource(Arc<AtomicUsize>);

    impl IdSource for CountingSource {
        fn platform(&self) -> &str {
            "test"
        }

        fn id_bytes(&self) -> [u8; ID_LEN] {
            self.0.fetch_add(1, Ordering::SeqCst);
            [1, 2, 3, 4, 5, 6]
        }
    }

    #[test]
    fn test_fixed_format() {
        let identity = DeviceIdentity::new(FixedIdSource::new(
            "esp32",
            [0xa4, 0xcf, 0x12, 0xb0, 0xc3, 0xd1],
        ));
        assert_eq!(identity.unique_id(), "modkit-esp32-a4cf12b0c3d1");
    }

    #[test]
    fn test_custom_prefix() {
        let identity =
            DeviceIdentity::new(FixedIdSource::new("avr", [0; ID_LEN])).with_prefix("greenhouse");
        assert_eq!(identity.unique_id(), "greenhouse-avr-000000000000");
    }

    #[test]
    fn test_generated_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let identity = DeviceIdentity::new(CountingSource(Arc::clone(&calls)));
        let first = identity.unique_id().to_string();
        assert_eq!(identity.unique_id(), first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_random_shape() {
        let identity = DeviceIdentity::new(RandomIdSource);
        let id = identity.unique_id();
        let suffix = id.strip_prefix("modkit-host-").expect("prefix");
        assert_eq!(suffix.len(), 12);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_file_source_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("device-id");

        let first = DeviceIdentity::new(FileIdSource::new("avr", &path))
            .unique_id()
            .to_string();
        let second = DeviceIdentity::new(FileIdSource::new("avr", &path))
            .unique_id()
            .to_string();
        assert_eq!(first, second);
        assert!(path.exists());
    }

    #[test]
    fn test_file_source_replaces_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("device-id");
        std::fs::write(&path, "not an id").expect("write");

        let id = DeviceIdentity::new(FileIdSource::new("avr", &path))
            .unique_id()
            .to_string();
        let stored = std::fs::read_to_string(&path).expect("read");
        assert!(id.ends_with(&stored));
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("0a0b0c0d0e0f"), Some([10, 11, 12, 13, 14, 15]));
        assert_eq!(parse_hex_id("0a0b"), None);
        assert_eq!(parse_hex_id("zz0b0c0d0e0f"), None);
    }
}
