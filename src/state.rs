// MIT License - Copyright (c) 2026 Peter Wright
// Per-session panel state

use std::collections::HashMap;

use crate::codec::{field, numeric_field};
use crate::constants::{layout, CODE_PARTITION_ARMED};
use crate::error::Result;
use crate::event::{ArmMode, PartitionUpdate, PartitionUserUpdate, SystemUpdate, ZoneUpdate};
use crate::table::CommandDescriptor;

/// Last frame seen for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    /// Display name of the last code seen
    pub name: String,
    /// The raw frame
    pub frame: String,
    pub send: bool,
}

impl EntityState {
    fn from_frame(descriptor: &CommandDescriptor, frame: &str) -> Self {
        Self {
            name: descriptor.display_name.clone(),
            frame: frame.to_string(),
            send: descriptor.is_command,
        }
    }
}

/// Zone, partition, user and system state for one connection.
///
/// A fresh tracker is created on every connect, so the first sighting of
/// each entity after a reconnect is reported as an initial update again.
#[derive(Debug, Clone)]
pub struct StateTracker {
    max_zones: u32,
    max_partitions: u32,
    zones: HashMap<u32, EntityState>,
    partitions: HashMap<u32, EntityState>,
    users: HashMap<u32, EntityState>,
    system: Option<EntityState>,
}

impl StateTracker {
    pub fn new(max_zones: u32, max_partitions: u32) -> Self {
        Self {
            max_zones,
            max_partitions,
            zones: HashMap::new(),
            partitions: HashMap::new(),
            users: HashMap::new(),
            system: None,
        }
    }

    /// Record a zone frame. Returns `None` for zones outside 1..=max_zones.
    pub fn update_zone(
        &mut self,
        code: &str,
        descriptor: &CommandDescriptor,
        frame: &str,
    ) -> Result<Option<ZoneUpdate>> {
        let (start, len) = layout::ZONE;
        let zone = numeric_field(frame, start, len)?;
        if !in_range(zone, self.max_zones) {
            return Ok(None);
        }

        let initial_update = !self.zones.contains_key(&zone);
        self.zones
            .insert(zone, EntityState::from_frame(descriptor, frame));

        Ok(Some(ZoneUpdate {
            zone,
            code: code.to_string(),
            status: descriptor.display_name.clone(),
            initial_update,
        }))
    }

    /// Record a partition frame, decoding the arm mode on the armed code.
    pub fn update_partition(
        &mut self,
        code: &str,
        descriptor: &CommandDescriptor,
        frame: &str,
    ) -> Result<Option<PartitionUpdate>> {
        let (start, len) = layout::PARTITION;
        let partition = numeric_field(frame, start, len)?;
        if !in_range(partition, self.max_partitions) {
            return Ok(None);
        }

        let (mode_code, mode) = if code == CODE_PARTITION_ARMED {
            let (start, len) = layout::ARM_MODE;
            let mode_code = field(frame, start, len)?;
            (Some(mode_code.to_string()), Some(ArmMode::from_code(mode_code)))
        } else {
            (None, None)
        };

        let initial_update = !self.partitions.contains_key(&partition);
        self.partitions
            .insert(partition, EntityState::from_frame(descriptor, frame));

        Ok(Some(PartitionUpdate {
            partition,
            code: code.to_string(),
            mode_code,
            mode,
            status: descriptor.display_name.clone(),
            initial_update,
        }))
    }

    /// Record a user opening/closing frame, gated on the partition number.
    pub fn update_partition_user(
        &mut self,
        code: &str,
        descriptor: &CommandDescriptor,
        frame: &str,
    ) -> Result<Option<PartitionUserUpdate>> {
        let (start, len) = layout::PARTITION;
        let partition = numeric_field(frame, start, len)?;
        let (start, len) = layout::USER;
        let user = numeric_field(frame, start, len)?;
        if !in_range(partition, self.max_partitions) {
            return Ok(None);
        }

        let initial_update = !self.users.contains_key(&user);
        self.users
            .insert(user, EntityState::from_frame(descriptor, frame));

        Ok(Some(PartitionUserUpdate {
            partition,
            code: code.to_string(),
            user,
            status: descriptor.display_name.clone(),
            initial_update,
        }))
    }

    /// Record a system-level frame.
    pub fn update_system(
        &mut self,
        code: &str,
        descriptor: &CommandDescriptor,
        frame: &str,
    ) -> SystemUpdate {
        self.system = Some(EntityState::from_frame(descriptor, frame));
        SystemUpdate {
            code: code.to_string(),
            status: descriptor.display_name.clone(),
        }
    }

    // --- Accessors ---

    pub fn zone(&self, id: u32) -> Option<&EntityState> {
        self.zones.get(&id)
    }

    pub fn partition(&self, id: u32) -> Option<&EntityState> {
        self.partitions.get(&id)
    }

    pub fn user(&self, id: u32) -> Option<&EntityState> {
        self.users.get(&id)
    }

    pub fn system(&self) -> Option<&EntityState> {
        self.system.as_ref()
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.zones.keys().copied()
    }

    pub fn partition_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.partitions.keys().copied()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.users.keys().copied()
    }
}

fn in_range(id: u32, max: u32) -> bool {
    (1..=max).contains(&id)
}
