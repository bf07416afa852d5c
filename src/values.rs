use std::fmt::Display;

use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::{Deserialize, Serialize, Serializer};

/// A parsed tag value.
///
/// The engine only materializes the value kinds it actually reads back or
/// writes out; everything else is kept as raw bytes in
/// [`EntryValue::Undefined`] so that unknown data can still be displayed and
/// then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Text(String),
    URational(URational),
    IRational(IRational),

    U8(u8),
    U16(u16),
    U32(u32),

    Undefined(Vec<u8>),

    URationalArray(Vec<URational>),
}

pub type URational = Rational<u32>;
pub type IRational = Rational<i32>;

#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rational<T>(pub T, pub T);

impl<T> Rational<T>
where
    T: Copy + Into<f64>,
{
    pub fn as_float(&self) -> f64 {
        std::convert::Into::<f64>::into(self.0) / std::convert::Into::<f64>::into(self.1)
    }
}

impl<T> From<(T, T)> for Rational<T>
where
    T: Copy,
{
    fn from(value: (T, T)) -> Self {
        Self(value.0, value.1)
    }
}

impl EntryValue {
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            EntryValue::U8(v) => Some(*v as u16),
            EntryValue::U16(v) => Some(*v),
            EntryValue::U32(v) => u16::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let EntryValue::Text(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_urational_array(&self) -> Option<&[URational]> {
        if let EntryValue::URationalArray(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

#[cfg(feature = "json_dump")]
impl Serialize for EntryValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Display for EntryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryValue::Text(v) => f.write_str(v),
            EntryValue::URational(v) => {
                write!(f, "{}/{} ({:.04})", v.0, v.1, v.as_float())
            }
            EntryValue::IRational(v) => {
                write!(f, "{}/{} ({:.04})", v.0, v.1, v.as_float())
            }
            EntryValue::U8(v) => Display::fmt(&v, f),
            EntryValue::U16(v) => Display::fmt(&v, f),
            EntryValue::U32(v) => Display::fmt(&v, f),
            EntryValue::Undefined(v) => {
                // Display up to MAX_DISPLAY_NUM bytes, then an ellipsis
                const MAX_DISPLAY_NUM: usize = 8;
                let s = v
                    .iter()
                    .map(|x| format!("0x{x:02x}"))
                    .take(MAX_DISPLAY_NUM + 1)
                    .enumerate()
                    .map(|(i, x)| {
                        if i >= MAX_DISPLAY_NUM {
                            "...".to_owned()
                        } else {
                            x
                        }
                    })
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "Undefined[{s}]")
            }
            EntryValue::URationalArray(v) => {
                const MAX_DISPLAY_NUM: usize = 3;
                let s = v
                    .iter()
                    .map(|x| format!("{}/{}", x.0, x.1))
                    .take(MAX_DISPLAY_NUM + 1)
                    .enumerate()
                    .map(|(i, x)| {
                        if i >= MAX_DISPLAY_NUM {
                            "...".to_owned()
                        } else {
                            x
                        }
                    })
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "URationalArray[{s}]")
            }
        }
    }
}

impl From<u8> for EntryValue {
    fn from(value: u8) -> Self {
        EntryValue::U8(value)
    }
}
impl From<u16> for EntryValue {
    fn from(value: u16) -> Self {
        EntryValue::U16(value)
    }
}
impl From<u32> for EntryValue {
    fn from(value: u32) -> Self {
        EntryValue::U32(value)
    }
}
impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        EntryValue::Text(value)
    }
}
impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}
impl From<(u32, u32)> for EntryValue {
    fn from(value: (u32, u32)) -> Self {
        Self::URational(value.into())
    }
}

pub(crate) fn read_u16(bs: &[u8], endian: Endianness) -> Option<u16> {
    let bytes: [u8; 2] = bs.get(..2)?.try_into().ok()?;
    Some(match endian {
        Endianness::Big => u16::from_be_bytes(bytes),
        Endianness::Little => u16::from_le_bytes(bytes),
        Endianness::Native => unimplemented!(),
    })
}

pub(crate) fn read_u32(bs: &[u8], endian: Endianness) -> Option<u32> {
    let bytes: [u8; 4] = bs.get(..4)?.try_into().ok()?;
    Some(match endian {
        Endianness::Big => u32::from_be_bytes(bytes),
        Endianness::Little => u32::from_le_bytes(bytes),
        Endianness::Native => unimplemented!(),
    })
}

pub(crate) fn get_cstr(data: &[u8]) -> String {
    data.iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}
