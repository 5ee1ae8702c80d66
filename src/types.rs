//! Core type definitions shared by the DM controllers.
//!
//! Provides zero-cost newtypes so register values, antenna indices and gain
//! values cannot be mixed up at compile time, plus the component identifiers
//! used by the watchdog to report per-controller status.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Generates a transparent newtype with the conversions the controllers rely on.
macro_rules! dm_newtype {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty) => $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Creates a new instance
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Raw value
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl Deref for $name {
            type Target = $inner;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl PartialEq<$inner> for $name {
            #[inline]
            fn eq(&self, other: &$inner) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for $inner {
            #[inline]
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }
    };
}

dm_newtype!(
    /// Receiver initial gain register value (IGI).
    InitialGain(u8) => "IGI="
);

dm_newtype!(
    /// Index of an RX antenna path.
    AntennaIndex(u8) => "ANT"
);

impl InitialGain {
    /// Signed distance from `other` to `self`.
    #[inline]
    pub fn distance_from(self, other: InitialGain) -> i16 {
        self.0 as i16 - other.0 as i16
    }

    /// Moves towards `target` by at most `max_step`.
    pub fn step_towards(self, target: InitialGain, max_step: u8) -> InitialGain {
        let diff = target.distance_from(self);
        let step = diff.clamp(-(max_step as i16), max_step as i16);
        InitialGain((self.0 as i16 + step).clamp(0, u8::MAX as i16) as u8)
    }
}

impl AntennaIndex {
    /// Index as a `usize` for per-antenna arrays.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Peer access point vendor, as classified by the association collaborator.
///
/// Used as the index into the EDCA parameter tables, so the discriminants
/// are dense and start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VendorKind {
    #[default]
    Unknown = 0,
    Realtek = 1,
    Realtek92se = 2,
    Broadcom = 3,
    Ralink = 4,
    Atheros = 5,
    Cisco = 6,
}

impl VendorKind {
    /// Number of vendor classes; length of every per-vendor table.
    pub const COUNT: usize = 7;

    /// All vendor classes in table order.
    pub const ALL: [VendorKind; Self::COUNT] = [
        VendorKind::Unknown,
        VendorKind::Realtek,
        VendorKind::Realtek92se,
        VendorKind::Broadcom,
        VendorKind::Ralink,
        VendorKind::Atheros,
        VendorKind::Cisco,
    ];

    /// Position of this vendor in the per-vendor tables.
    #[inline]
    pub const fn table_index(self) -> usize {
        self as usize
    }
}

/// Identifies one sub-controller of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Dig,
    RxPath,
    TxPower,
    Thresholds,
    RateHint,
    Edca,
}

impl Component {
    /// Controllers in dispatch order.
    pub const DISPATCH_ORDER: [Component; 6] = [
        Component::Dig,
        Component::RxPath,
        Component::TxPower,
        Component::Thresholds,
        Component::RateHint,
        Component::Edca,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Dig => "dig",
            Component::RxPath => "rx_path",
            Component::TxPower => "tx_power",
            Component::Thresholds => "thresholds",
            Component::RateHint => "rate_hint",
            Component::Edca => "edca",
        };
        f.write_str(name)
    }
}

/// Bitmap of [`Component`]s, used for per-tick status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ComponentMask(u8);

impl ComponentMask {
    /// The empty set.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Adds `component` to the set.
    #[inline]
    pub fn insert(&mut self, component: Component) {
        self.0 |= component.bit();
    }

    /// Returns true if `component` is in the set.
    #[inline]
    pub const fn contains(self, component: Component) -> bool {
        self.0 & component.bit() != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of components in the set.
    #[inline]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Raw bitmap, bit `n` set for the `n`th component in dispatch order.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Iterates over the members in dispatch order.
    pub fn iter(self) -> impl Iterator<Item = Component> {
        Component::DISPATCH_ORDER
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Component> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        let mut mask = ComponentMask::EMPTY;
        for component in iter {
            mask.insert(component);
        }
        mask
    }
}

impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, component) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", component)?;
        }
        f.write_str("]")
    }
}
