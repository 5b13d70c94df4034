// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Writes a compiled [`BlockTable`] out as source code, together with a lookup function.
//!
//! The generated lookup function is regenerated together with its data,
//! so it bakes the block size in as a constant.

use std::fmt::{Display, LowerHex, Write as _};

use indoc::writedoc;

use crate::table::BlockTable;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum Language {
    Cpp,
    #[default]
    Rust,
}

impl Language {
    /// Size of one pointer table slot.
    pub fn pointer_bytes(self) -> usize {
        match self {
            // nullable `const T*`
            Language::Cpp => size_of::<usize>(),
            // `Option<&[T]>`
            Language::Rust => 2 * size_of::<usize>(),
        }
    }
}

/// Renders a single value as a source literal.
pub type ValueFormatter<'a, T> = &'a (dyn Fn(&mut String, &T) + Sync);

pub fn format_decimal<T: Display>(buf: &mut String, value: &T) {
    _ = write!(buf, "{value}");
}

pub fn format_hex<T: LowerHex>(buf: &mut String, value: &T) {
    _ = write!(buf, "{value:#x}");
}

pub struct TableEmitter<'a, T> {
    lang: Language,
    name: &'a str,
    value_type: &'a str,
    value_bytes: usize,
    format_value: ValueFormatter<'a, T>,
    columns: usize,
}

impl<'a, T> TableEmitter<'a, T> {
    /// `name` is the snake_case name of the table. It names the lookup function,
    /// and in upper case, the data arrays.
    pub fn new(
        lang: Language,
        name: &'a str,
        value_type: &'a str,
        format_value: ValueFormatter<'a, T>,
    ) -> Self {
        Self { lang, name, value_type, value_bytes: size_of::<T>(), format_value, columns: 16 }
    }

    /// Overrides the per-value size used by [`TableEmitter::encoded_size`].
    /// Defaults to `size_of::<T>()`.
    pub fn with_value_bytes(mut self, value_bytes: usize) -> Self {
        self.value_bytes = value_bytes;
        self
    }

    /// Number of values per line.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns.max(1);
        self
    }

    /// The size of the emitted arrays in bytes.
    pub fn encoded_size(&self, table: &BlockTable<T>) -> usize {
        table.block_count() * (self.lang.pointer_bytes() + self.value_bytes)
            + table.stored_values() * self.value_bytes
    }

    pub fn emit(&self, buf: &mut String, table: &BlockTable<T>) {
        match self.lang {
            Language::Cpp => self.emit_cpp(buf, table),
            Language::Rust => self.emit_rust(buf, table),
        }
    }

    fn write_values<'v>(&self, buf: &mut String, values: impl Iterator<Item = &'v T>)
    where
        T: 'v,
    {
        for (j, value) in values.enumerate() {
            if j % self.columns == 0 {
                buf.push_str("\n   ");
            }
            buf.push(' ');
            (self.format_value)(buf, value);
            buf.push(',');
        }
        buf.push('\n');
    }

    fn emit_rust(&self, buf: &mut String, table: &BlockTable<T>) {
        let upper = self.name.to_ascii_uppercase();
        let ty = self.value_type;
        let block_size = table.block_size();

        for (i, sub) in table.sub_arrays().iter().enumerate() {
            _ = write!(buf, "#[rustfmt::skip]\nstatic {upper}_BLOCK{i}: [{ty}; {}] = [", sub.len());
            self.write_values(buf, sub.iter());
            buf.push_str("];\n");
        }

        _ = write!(
            buf,
            "#[rustfmt::skip]\nstatic {upper}_POINTERS: [Option<&[{ty}]>; {}] = [",
            table.block_count()
        );
        for (j, ptr) in table.pointers().iter().enumerate() {
            if j % self.columns == 0 {
                buf.push_str("\n   ");
            }
            match ptr {
                Some(p) => {
                    _ = write!(buf, " Some(&{upper}_BLOCK{p}),");
                }
                None => buf.push_str(" None,"),
            }
        }
        buf.push_str("\n];\n");

        _ = write!(
            buf,
            "#[rustfmt::skip]\nstatic {upper}_DEFAULTS: [{ty}; {}] = [",
            table.block_count()
        );
        self.write_values(buf, table.defaults().iter());
        buf.push_str("];\n");

        _ = writedoc!(
            buf,
            "
            pub const {upper}_BLOCK_SIZE: usize = {block_size};
            pub const {upper}_LEN: usize = {len:#x};

            #[inline]
            pub fn {name}(cp: u32) -> {ty} {{
                let cp = cp as usize;
            ",
            upper = upper,
            block_size = block_size,
            len = table.len(),
            name = self.name,
            ty = ty,
        );
        if table.len() % block_size != 0 {
            _ = writeln!(buf, "    assert!(cp < {upper}_LEN);");
        }
        _ = writedoc!(
            buf,
            "
                let block = cp / {block_size};
                match {upper}_POINTERS[block] {{
                    Some(values) => values[cp % {block_size}],
                    None => {upper}_DEFAULTS[block],
                }}
            }}
            ",
            upper = upper,
            block_size = block_size,
        );
    }

    fn emit_cpp(&self, buf: &mut String, table: &BlockTable<T>) {
        let name = self.name;
        let ty = self.value_type;
        let block_size = table.block_size();

        for (i, sub) in table.sub_arrays().iter().enumerate() {
            _ = write!(buf, "static const {ty} s_{name}_block{i}[{}] = {{", sub.len());
            self.write_values(buf, sub.iter());
            buf.push_str("};\n");
        }

        _ = write!(
            buf,
            "static const {ty}* const s_{name}_pointers[{}] = {{",
            table.block_count()
        );
        for (j, ptr) in table.pointers().iter().enumerate() {
            if j % self.columns == 0 {
                buf.push_str("\n   ");
            }
            match ptr {
                Some(p) => {
                    _ = write!(buf, " s_{name}_block{p},");
                }
                None => buf.push_str(" nullptr,"),
            }
        }
        buf.push_str("\n};\n");

        _ = write!(buf, "static const {ty} s_{name}_defaults[{}] = {{", table.block_count());
        self.write_values(buf, table.defaults().iter());
        buf.push_str("};\n");

        _ = writedoc!(
            buf,
            "
            inline {ty} ucd_{name}(const uint32_t cp)
            {{
                const {ty}* const p = s_{name}_pointers[cp / {block_size}];
                if (p) {{
                    return p[cp % {block_size}];
                }}
                return s_{name}_defaults[cp / {block_size}];
            }}
            ",
            name = name,
            ty = ty,
            block_size = block_size,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlockTable<u8> {
        let values: Vec<u8> = (0..64).map(|i| if i < 32 || i % 2 == 0 { 0 } else { 1 }).collect();
        BlockTable::compile(&values, 16, 0).unwrap()
    }

    #[test]
    fn test_emit_rust() {
        let table = sample();
        let mut buf = String::new();
        TableEmitter::new(Language::Rust, "demo", "u8", &format_decimal::<u8>).emit(&mut buf, &table);

        assert!(buf.contains("static DEMO_BLOCK0: [u8; 16] = ["));
        assert!(buf.contains("static DEMO_BLOCK1: [u8; 16] = ["));
        assert!(buf.contains("static DEMO_POINTERS: [Option<&[u8]>; 4] = [\n    None, None, Some(&DEMO_BLOCK0), Some(&DEMO_BLOCK1),\n];"));
        assert!(buf.contains("static DEMO_DEFAULTS: [u8; 4] = [\n    0, 0, 0, 0,\n];"));
        assert!(buf.contains("pub const DEMO_BLOCK_SIZE: usize = 16;"));
        assert!(buf.contains("pub fn demo(cp: u32) -> u8 {"));
        assert!(buf.contains("Some(values) => values[cp % 16],"));
        assert!(!buf.contains("assert!"));
    }

    #[test]
    fn test_emit_rust_partial_block_is_bounded() {
        let table = BlockTable::compile(&[1u8, 2, 3, 4, 5, 6], 4, 0).unwrap();
        let mut buf = String::new();
        TableEmitter::new(Language::Rust, "tail", "u8", &format_decimal::<u8>).emit(&mut buf, &table);
        assert!(buf.contains("static TAIL_BLOCK1: [u8; 2] = ["));
        assert!(buf.contains("assert!(cp < TAIL_LEN);"));
    }

    #[test]
    fn test_emit_cpp() {
        let table = sample();
        let mut buf = String::new();
        TableEmitter::new(Language::Cpp, "demo", "uint8_t", &format_hex::<u8>).emit(&mut buf, &table);

        assert!(buf.contains("static const uint8_t s_demo_block0[16] = {"));
        assert!(buf.contains(" 0x1,"));
        assert!(buf.contains(
            "static const uint8_t* const s_demo_pointers[4] = {\n    nullptr, nullptr, s_demo_block0, s_demo_block1,\n};"
        ));
        assert!(buf.contains("inline uint8_t ucd_demo(const uint32_t cp)"));
        assert!(buf.contains("return p[cp % 16];"));
    }

    #[test]
    fn test_encoded_size() {
        let table = sample();
        let rust = TableEmitter::new(Language::Rust, "demo", "u8", &format_decimal::<u8>);
        assert_eq!(rust.encoded_size(&table), 4 * (16 + 1) + 32);
        let cpp = TableEmitter::new(Language::Cpp, "demo", "uint8_t", &format_decimal::<u8>)
            .with_value_bytes(2);
        assert_eq!(cpp.encoded_size(&table), 4 * (8 + 2) + 64);
    }
}
