// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

pub mod values;

pub use values::{decode_array, Cell, InvalidPropertyValue, PropertyValue, StringList};

/// A node property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeProperty<'a> {
    /// Property name
    pub name: &'a str,
    /// Property value
    pub value: &'a [u8],
}

impl<'a> NodeProperty<'a> {
    /// Attempt to parse the property value as the given type
    pub fn as_value<V: PropertyValue<'a>>(&self) -> Result<V, InvalidPropertyValue> {
        V::parse(self.value)
    }

    /// Decodes the value as an array of big-endian cells, if its length is a
    /// whole number of cells
    pub fn as_array<T: Cell>(&self) -> Option<Vec<T>> {
        decode_array(self.value)
    }

    /// Attempt to parse the property value as a `&str`
    pub fn as_str(&self) -> Option<&'a str> {
        self.as_value().ok()
    }

    /// Whether the value is one or more NUL-terminated printable strings
    pub fn is_string_list(&self) -> bool {
        match self.value.split_last() {
            Some((&0, body)) if !body.is_empty() => {
                body.split(|&b| b == 0).all(|s| !s.is_empty() && s.iter().all(|b| b.is_ascii_graphic() || *b == b' '))
            }
            _ => false,
        }
    }
}
