//! Intel `IA32_PERFEVTSELx` event select word.
//!
//! ```text
//!  31        24 23  22  21  20  19  18  17  16 15       8 7        0
//! +------------+---+---+---+---+---+---+---+---+----------+----------+
//! |   cmask    |inv|en |any|int|pc | e |os |usr|  umask   |  event   |
//! +------------+---+---+---+---+---+---+---+---+----------+----------+
//! ```
//!
//! The word is stored as a plain `u32`; the field view is computed with
//! mask/shift accessors.


use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Error};

/// A field of the event select word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Event select, bits 0..=7.
    Event,
    /// Unit mask, bits 8..=15.
    Umask,
    /// Count at privilege levels 1, 2 and 3.
    Usr,
    /// Count at privilege level 0.
    Os,
    /// Edge detect.
    Edge,
    /// Pin control.
    PinControl,
    /// APIC interrupt on overflow.
    Interrupt,
    /// Count events of both hardware threads of the core.
    AnyThread,
    /// Local counter enable.
    Enable,
    /// Invert the counter mask comparison.
    Invert,
    /// Counter mask, bits 24..=31.
    Cmask,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Event,
        Field::Umask,
        Field::Usr,
        Field::Os,
        Field::Edge,
        Field::PinControl,
        Field::Interrupt,
        Field::AnyThread,
        Field::Enable,
        Field::Invert,
        Field::Cmask,
    ];

    pub const fn offset(self) -> u32 {
        match self {
            Field::Event => 0,
            Field::Umask => 8,
            Field::Usr => 16,
            Field::Os => 17,
            Field::Edge => 18,
            Field::PinControl => 19,
            Field::Interrupt => 20,
            Field::AnyThread => 21,
            Field::Enable => 22,
            Field::Invert => 23,
            Field::Cmask => 24,
        }
    }

    pub const fn width(self) -> u32 {
        match self {
            Field::Event | Field::Umask | Field::Cmask => 8,
            _ => 1,
        }
    }

    /// Mask of the field value before shifting into place.
    pub const fn mask(self) -> u32 {
        (1 << self.width()) - 1
    }

    /// Short name, as accepted by [`EventSelect::from_str`].
    pub const fn name(self) -> &'static str {
        match self {
            Field::Event => "event",
            Field::Umask => "umask",
            Field::Usr => "usr",
            Field::Os => "os",
            Field::Edge => "edge",
            Field::PinControl => "pc",
            Field::Interrupt => "int",
            Field::AnyThread => "any",
            Field::Enable => "en",
            Field::Invert => "inv",
            Field::Cmask => "cmask",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event select word for one programmable counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventSelect(u32);

impl EventSelect {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn get(self, field: Field) -> u32 {
        (self.0 >> field.offset()) & field.mask()
    }

    /// Stores `value` into `field`, rejecting values wider than the field.
    pub fn set(&mut self, field: Field, value: u32) -> Result<(), ConfigError> {
        if value & !field.mask() != 0 {
            return Err(ConfigError::FieldWidth {
                field,
                value: value as _,
                width: field.width(),
            });
        }
        self.0 = (self.0 & !(field.mask() << field.offset())) | (value << field.offset());
        Ok(())
    }

    pub const fn event(self) -> u8 {
        self.get(Field::Event) as _
    }

    pub const fn umask(self) -> u8 {
        self.get(Field::Umask) as _
    }

    pub const fn cmask(self) -> u8 {
        self.get(Field::Cmask) as _
    }

    pub const fn flag(self, field: Field) -> bool {
        self.get(field) != 0
    }

    pub fn fields(self) -> Fields {
        decode(self.0)
    }
}

impl From<Fields> for EventSelect {
    fn from(value: Fields) -> Self {
        Self(encode(&value))
    }
}

impl From<EventSelect> for Fields {
    fn from(value: EventSelect) -> Self {
        decode(value.0)
    }
}

impl From<EventSelect> for u32 {
    fn from(value: EventSelect) -> Self {
        value.0
    }
}

impl TryFrom<u64> for EventSelect {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| ConfigError::WordWidth(value))
    }
}

impl fmt::Display for EventSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

// Accepts either a raw word (`0x41412e`) or comma separated fields
// (`event=0x2e,umask=0x41,usr,en`).
impl FromStr for EventSelect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || ConfigError::Malformed(s.to_owned());

        if !s.contains('=') && !s.contains(',') {
            if let Some(value) = parse_int(s) {
                return Ok(Self::try_from(value)?);
            }
        }

        let mut select = Self::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = match part.split_once('=') {
                Some((key, value)) => (key.trim(), parse_int(value.trim()).ok_or_else(malformed)?),
                None => (part, 1),
            };
            let field = Field::from_name(key).ok_or_else(malformed)?;
            let value = u32::try_from(value).map_err(|_| ConfigError::FieldWidth {
                field,
                value,
                width: field.width(),
            })?;
            select.set(field, value)?;
        }

        if select.0 == 0 {
            return Err(malformed().into());
        }
        Ok(select)
    }
}

fn parse_int(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Decoded view of an [`EventSelect`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fields {
    pub event: u8,
    pub umask: u8,
    pub usr: bool,
    pub os: bool,
    pub edge: bool,
    pub pin_control: bool,
    pub interrupt: bool,
    pub any_thread: bool,
    pub enable: bool,
    pub invert: bool,
    pub cmask: u8,
}

pub fn encode(fields: &Fields) -> u32 {
    let flag = |set: bool, field: Field| (set as u32) << field.offset();

    (fields.event as u32) << Field::Event.offset()
        | (fields.umask as u32) << Field::Umask.offset()
        | flag(fields.usr, Field::Usr)
        | flag(fields.os, Field::Os)
        | flag(fields.edge, Field::Edge)
        | flag(fields.pin_control, Field::PinControl)
        | flag(fields.interrupt, Field::Interrupt)
        | flag(fields.any_thread, Field::AnyThread)
        | flag(fields.enable, Field::Enable)
        | flag(fields.invert, Field::Invert)
        | (fields.cmask as u32) << Field::Cmask.offset()
}

pub fn decode(word: u32) -> Fields {
    let s = EventSelect(word);
    Fields {
        event: s.event(),
        umask: s.umask(),
        usr: s.flag(Field::Usr),
        os: s.flag(Field::Os),
        edge: s.flag(Field::Edge),
        pin_control: s.flag(Field::PinControl),
        interrupt: s.flag(Field::Interrupt),
        any_thread: s.flag(Field::AnyThread),
        enable: s.flag(Field::Enable),
        invert: s.flag(Field::Invert),
        cmask: s.cmask(),
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = EventSelect::from(*self);
        for field in Field::ALL {
            writeln!(f, "{:<6}: {:#04x}", field.name(), word.get(field))?;
        }
        Ok(())
    }
}
