// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hardware resource ledger.
//!
//! Tracks exclusive ownership of hardware identifiers (pins, bus addresses,
//! ports) so two modules can never drive the same line. Each
//! [`ResourceKind`] has its own table: digital pin 5 and I2C address 5 do
//! not collide.
//!
//! A second `lock` on a held `(kind, id)` is rejected and logged with both
//! owners; the first reservation is never overwritten.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Resource identifier (pin number, bus address, port index).
pub type ResourceId = u32;

/// Category of exclusive hardware identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// General-purpose digital pin (`gpio`).
    DigitalPin,
    /// I2C device address (`i2c`).
    BusAddress,
    /// SPI chip-select pin (`spi`).
    ChipSelectPin,
    /// UART port index (`uart`).
    SerialPort,
    /// ADC input pin (`adc`).
    AnalogInputPin,
    /// DAC output pin (`dac`).
    AnalogOutputPin,
}

impl ResourceKind {
    /// Every kind, in table order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::DigitalPin,
        ResourceKind::BusAddress,
        ResourceKind::ChipSelectPin,
        ResourceKind::SerialPort,
        ResourceKind::AnalogInputPin,
        ResourceKind::AnalogOutputPin,
    ];

    /// Map a configuration `resource.type` string to a kind.
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "gpio" => Some(Self::DigitalPin),
            "i2c" => Some(Self::BusAddress),
            "spi" => Some(Self::ChipSelectPin),
            "uart" => Some(Self::SerialPort),
            "adc" => Some(Self::AnalogInputPin),
            "dac" => Some(Self::AnalogOutputPin),
            _ => None,
        }
    }

    /// The configuration `resource.type` string for this kind.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::DigitalPin => "gpio",
            Self::BusAddress => "i2c",
            Self::ChipSelectPin => "spi",
            Self::SerialPort => "uart",
            Self::AnalogInputPin => "adc",
            Self::AnalogOutputPin => "dac",
        }
    }

    /// Key carrying the identifier inside a configuration resource block.
    pub fn id_key(self) -> &'static str {
        match self {
            Self::DigitalPin | Self::AnalogInputPin | Self::AnalogOutputPin => "pin",
            Self::BusAddress => "address",
            Self::ChipSelectPin => "cs_pin",
            Self::SerialPort => "port",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DigitalPin => "digital pin",
            Self::BusAddress => "bus address",
            Self::ChipSelectPin => "chip-select pin",
            Self::SerialPort => "serial port",
            Self::AnalogInputPin => "analog input pin",
            Self::AnalogOutputPin => "analog output pin",
        };
        f.write_str(name)
    }
}

/// One held resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub owner: String,
}

/// Exclusive-ownership table, one map per [`ResourceKind`].
#[derive(Debug, Default)]
pub struct ResourceLedger {
    registries: Mutex<[BTreeMap<ResourceId, String>; 6]>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `(kind, id)` for `owner`.
    ///
    /// Returns `false` without side effects if the resource is already held,
    /// including when `owner` itself holds it.
    pub fn lock(&self, kind: ResourceKind, id: ResourceId, owner: &str) -> bool {
        let mut registries = self.registries.lock();
        let registry = &mut registries[kind.index()];

        if let Some(current) = registry.get(&id) {
            tracing::error!(
                "RESOURCE CONFLICT: {} {} is already locked by '{}', cannot be locked by '{}'",
                kind,
                id,
                current,
                owner
            );
            return false;
        }

        registry.insert(id, owner.to_string());
        tracing::debug!(%kind, id, owner, "resource locked");
        true
    }

    /// Release `(kind, id)`. No-op if it is not held.
    pub fn release(&self, kind: ResourceKind, id: ResourceId) {
        if let Some(owner) = self.registries.lock()[kind.index()].remove(&id) {
            tracing::debug!(%kind, id, owner = %owner, "resource released");
        }
    }

    /// Release every reservation held by `owner`. Returns how many were freed.
    pub fn release_owner(&self, owner: &str) -> usize {
        let mut registries = self.registries.lock();
        let mut released = 0;
        for registry in registries.iter_mut() {
            let before = registry.len();
            registry.retain(|_, held_by| held_by != owner);
            released += before - registry.len();
        }
        if released > 0 {
            tracing::debug!(owner, released, "released all resources of owner");
        }
        released
    }

    /// Check whether `(kind, id)` is held.
    pub fn is_locked(&self, kind: ResourceKind, id: ResourceId) -> bool {
        self.registries.lock()[kind.index()].contains_key(&id)
    }

    /// Current owner of `(kind, id)`, `None` if free.
    pub fn owner(&self, kind: ResourceKind, id: ResourceId) -> Option<String> {
        self.registries.lock()[kind.index()].get(&id).cloned()
    }

    /// Snapshot of every reservation, grouped by kind then ordered by id.
    pub fn reservations(&self) -> Vec<Reservation> {
        let registries = self.registries.lock();
        ResourceKind::ALL
            .iter()
            .flat_map(|&kind| {
                registries[kind.index()]
                    .iter()
                    .map(move |(&id, owner)| Reservation {
                        kind,
                        id,
                        owner: owner.clone(),
                    })
            })
            .collect()
    }

    /// Scoped reservation: locks now, releases when the guard is dropped.
    ///
    /// `None` if the resource is already held.
    pub fn acquire(
        self: &Arc<Self>,
        kind: ResourceKind,
        id: ResourceId,
        owner: &str,
    ) -> Option<ResourceGuard> {
        if !self.lock(kind, id, owner) {
            return None;
        }
        Some(ResourceGuard {
            ledger: Arc::clone(self),
            kind,
            id,
            owner: owner.to_string(),
        })
    }
}

/// Reservation released on drop. Created by [`ResourceLedger::acquire`].
#[derive(Debug)]
pub struct ResourceGuard {
    ledger: Arc<ResourceLedger>,
    kind: ResourceKind,
    id: ResourceId,
    owner: String,
}

impl ResourceGuard {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // Someone may have released and re-locked it in the meantime.
        if self.ledger.owner(self.kind, self.id).as_deref() == Some(self.owner.as_str()) {
            self.ledger.release(self.kind, self.id);
        }
    }
}
