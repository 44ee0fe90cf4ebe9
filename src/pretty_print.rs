// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use crate::{
    node::Node,
    properties::{NodeProperty, StringList},
};

pub fn print_node(f: &mut core::fmt::Formatter<'_>, node: Node<'_>, n_spaces: usize) -> core::fmt::Result {
    write!(f, "{:width$}", "", width = n_spaces)?;
    writeln!(f, "{} {{", if node.name().is_empty() { "/" } else { node.name() })?;

    let mut were_props = false;
    for prop in node.properties() {
        were_props = true;

        write!(f, "{:width$}", "", width = n_spaces + 4)?;
        print_property(f, prop)?;
    }

    if node.has_children() && were_props {
        writeln!(f)?;
    }

    let mut first = true;
    for child in node.children() {
        if !first {
            writeln!(f)?;
        }

        print_node(f, child, n_spaces + 4)?;
        first = false;
    }

    write!(f, "{:width$}", "", width = n_spaces)?;
    writeln!(f, "}};")?;

    Ok(())
}

fn print_property(f: &mut core::fmt::Formatter<'_>, prop: NodeProperty<'_>) -> core::fmt::Result {
    if prop.value.is_empty() {
        return writeln!(f, "{};", prop.name);
    }

    if prop.is_string_list() {
        write!(f, "{} = ", prop.name)?;
        let strs: StringList<'_> = prop.as_value().map_err(|_| core::fmt::Error)?;
        for (i, s) in strs.enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{s}\"")?;
        }
        return writeln!(f, ";");
    }

    match prop.as_array::<u32>() {
        Some(cells) => {
            write!(f, "{} = <", prop.name)?;
            for (i, cell) in cells.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{cell:#x}")?;
            }
            writeln!(f, ">;")
        }
        None => {
            write!(f, "{} = [", prop.name)?;
            for (i, byte) in prop.value.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{byte:02x}")?;
            }
            writeln!(f, "];")
        }
    }
}
