// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control-plane messages understood by the engine

use crate::InterfaceHandle;
use std::fmt::Display;
use std::net::Ipv4Addr;

/// Engine status codes that the binding gives a meaning to
pub mod retval {
    /// Success
    pub const OK: i32 = 0;
    /// The interface index does not exist
    pub const INVALID_SW_IF_INDEX: i32 = -2;
    /// The value (address, feature) is already configured
    pub const VALUE_EXIST: i32 = -17;
}

/// Which side of the translation boundary an interface faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatRole {
    Inside,
    Outside,
}

impl NatRole {
    const INSIDE_FLAG: u8 = 0x20;
    const OUTSIDE_FLAG: u8 = 0x10;

    #[must_use]
    pub(crate) const fn flags(self) -> u8 {
        match self {
            NatRole::Inside => Self::INSIDE_FLAG,
            NatRole::Outside => Self::OUTSIDE_FLAG,
        }
    }
    pub(crate) const fn from_flags(flags: u8) -> Option<Self> {
        match flags {
            Self::INSIDE_FLAG => Some(NatRole::Inside),
            Self::OUTSIDE_FLAG => Some(NatRole::Outside),
            _ => None,
        }
    }
}

impl Display for NatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NatRole::Inside => write!(f, "inside"),
            NatRole::Outside => write!(f, "outside"),
        }
    }
}

/// Types of interface the engine can create for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    Memif,
    Tap,
}

impl InterfaceKind {
    pub(crate) const fn code(self) -> u8 {
        match self {
            InterfaceKind::Memif => 1,
            InterfaceKind::Tap => 2,
        }
    }
    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(InterfaceKind::Memif),
            2 => Some(InterfaceKind::Tap),
            _ => None,
        }
    }
    /// Parse a mechanism name, ignoring case
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MEMIF" => Some(InterfaceKind::Memif),
            "TAP" | "KERNEL" => Some(InterfaceKind::Tap),
            _ => None,
        }
    }
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceKind::Memif => "MEMIF",
            InterfaceKind::Tap => "TAP",
        }
    }
}

impl Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control-plane request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Enable (or disable) NAT on an interface with the given role
    InterfaceFeature {
        is_add: bool,
        handle: InterfaceHandle,
        role: NatRole,
    },
    /// Add (or remove) a range of addresses to the translation pool
    AddressRange {
        is_add: bool,
        first: Ipv4Addr,
        last: Ipv4Addr,
        vrf_id: u32,
    },
    /// Restrict the ports used for translation
    PortRange { start: u16, end: u16 },
    /// Create an interface; the reply carries its handle
    CreateInterface { kind: InterfaceKind, name: String },
    /// Delete an interface
    DeleteInterface { handle: InterfaceHandle },
}

/// Discriminant of a [`Request`], which is also its wire message id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestKind {
    InterfaceFeature = 1,
    AddressRange = 2,
    PortRange = 3,
    CreateInterface = 4,
    DeleteInterface = 5,
}

impl RequestKind {
    #[must_use]
    pub const fn msg_id(self) -> u16 {
        self as u16
    }
    #[must_use]
    pub const fn from_msg_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(RequestKind::InterfaceFeature),
            2 => Some(RequestKind::AddressRange),
            3 => Some(RequestKind::PortRange),
            4 => Some(RequestKind::CreateInterface),
            5 => Some(RequestKind::DeleteInterface),
            _ => None,
        }
    }
    /// Name of the engine API message
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RequestKind::InterfaceFeature => "nat44_interface_add_del_feature",
            RequestKind::AddressRange => "nat44_add_del_address_range",
            RequestKind::PortRange => "nat_set_port_range",
            RequestKind::CreateInterface => "create_interface",
            RequestKind::DeleteInterface => "delete_interface",
        }
    }
}

impl Request {
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Request::InterfaceFeature { .. } => RequestKind::InterfaceFeature,
            Request::AddressRange { .. } => RequestKind::AddressRange,
            Request::PortRange { .. } => RequestKind::PortRange,
            Request::CreateInterface { .. } => RequestKind::CreateInterface,
            Request::DeleteInterface { .. } => RequestKind::DeleteInterface,
        }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.kind().name();
        match self {
            Request::InterfaceFeature {
                is_add,
                handle,
                role,
            } => write!(f, "{name} is_add:{is_add} sw_if_index:{handle} role:{role}"),
            Request::AddressRange {
                is_add,
                first,
                last,
                vrf_id,
            } => write!(f, "{name} is_add:{is_add} {first}-{last} vrf:{vrf_id}"),
            Request::PortRange { start, end } => write!(f, "{name} {start}-{end}"),
            Request::CreateInterface { kind, name: ifname } => {
                write!(f, "{name} kind:{kind} name:{ifname}")
            }
            Request::DeleteInterface { handle } => write!(f, "{name} sw_if_index:{handle}"),
        }
    }
}

/// Reply to a [`Request`]: an engine status code and, for creations, the new interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub retval: i32,
    pub handle: InterfaceHandle,
}

impl Reply {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            retval: retval::OK,
            handle: InterfaceHandle::new(0),
        }
    }
    #[must_use]
    pub const fn with_retval(retval: i32) -> Self {
        Self {
            retval,
            handle: InterfaceHandle::new(0),
        }
    }
    #[must_use]
    pub const fn created(handle: InterfaceHandle) -> Self {
        Self {
            retval: retval::OK,
            handle,
        }
    }
}
