// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The property tables this tool knows how to build.
//!
//! Each table is read from one UCD file, expanded into a dense array
//! and handed to the block compressor on its own.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, bail};
use blocktab::codegen::{Language, TableEmitter, ValueFormatter, format_decimal, format_hex};
use blocktab::cost::{CostModel, select_block_size_from};
use blocktab::persist::FixedWidth;
use blocktab::{BlockTable, CANDIDATE_BLOCK_SIZES};
use indoc::writedoc;

use crate::ucd::{
    DenseArray, Interner, parse_decomposition, parse_property_value_aliases,
    parse_range_assignments, parse_script_extensions, parse_unicode_data, to_identifier,
};

/// Settings shared by every table.
pub struct Settings {
    pub lang: Language,
    pub binary: bool,
    pub measured_cost: bool,
}

const PROPERTY_VALUE_ALIASES: &str = "PropertyValueAliases.txt";

type BuildResult = anyhow::Result<TableOutput>;

/// The inputs a table is built from, besides its own source file.
#[derive(Clone, Copy)]
enum Builder {
    Single(fn(&Settings, &TableConfig, &str) -> BuildResult),
    /// Also receives PropertyValueAliases.txt, to resolve short value names.
    WithAliases(fn(&Settings, &TableConfig, &str, &str) -> BuildResult),
}

/// How a single table is compiled.
pub struct TableConfig {
    pub name: &'static str,
    /// Path of the source file, relative to the UCD directory.
    pub source: &'static str,
    pub candidates: &'static [usize],
    build: Builder,
}

impl TableConfig {
    pub fn build(&self, ctx: &Settings, ucd_dir: &Path) -> BuildResult {
        let text = read_ucd_file(ucd_dir, self.source)?;
        let out = match self.build {
            Builder::Single(build) => build(ctx, self, &text),
            Builder::WithAliases(build) => {
                let aliases = read_ucd_file(ucd_dir, PROPERTY_VALUE_ALIASES)?;
                build(ctx, self, &text, &aliases)
            }
        };
        out.with_context(|| format!("failed to build {}", self.name))
    }
}

fn read_ucd_file(ucd_dir: &Path, file: &str) -> anyhow::Result<String> {
    let path = ucd_dir.join(file);
    std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// Everything produced for one table.
pub struct TableOutput {
    pub name: &'static str,
    /// Type definitions, data arrays and the lookup function.
    pub source: String,
    /// The persisted table, if requested and the value type supports it.
    pub binary: Option<Vec<u8>>,
    /// Size of the emitted data in bytes.
    pub size: usize,
}

pub const TABLES: &[TableConfig] = &[
    TableConfig {
        name: "general_category",
        source: "UnicodeData.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_general_category),
    },
    TableConfig {
        name: "properties",
        source: "PropList.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_properties),
    },
    TableConfig {
        name: "derived_core_properties",
        source: "DerivedCoreProperties.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_derived_core_properties),
    },
    TableConfig {
        name: "block",
        source: "Blocks.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_block),
    },
    TableConfig {
        name: "script",
        source: "Scripts.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_script),
    },
    TableConfig {
        name: "script_extension_id",
        source: "ScriptExtensions.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::WithAliases(build_script_extension_id),
    },
    TableConfig {
        name: "normalization",
        source: "UnicodeData.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_normalization),
    },
    TableConfig {
        name: "grapheme_break",
        source: "auxiliary/GraphemeBreakProperty.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_grapheme_break),
    },
    TableConfig {
        name: "word_break",
        source: "auxiliary/WordBreakProperty.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_word_break),
    },
    TableConfig {
        name: "sentence_break",
        source: "auxiliary/SentenceBreakProperty.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_sentence_break),
    },
    TableConfig {
        name: "emoji",
        source: "emoji/emoji-data.txt",
        candidates: &CANDIDATE_BLOCK_SIZES,
        build: Builder::Single(build_emoji),
    },
];

/// Compiles `values`, checks that every codepoint decodes back to its input value,
/// and writes out the result.
fn compile<T: Clone + PartialEq + Sync>(
    ctx: &Settings,
    cfg: &TableConfig,
    values: &[T],
    placeholder: T,
    emitter: TableEmitter<T>,
    value_bytes: &(dyn Fn(&T) -> usize + Sync),
    source: &mut String,
) -> anyhow::Result<(BlockTable<T>, usize)> {
    let model = if ctx.measured_cost {
        CostModel::Measured { slot_bytes: ctx.lang.pointer_bytes(), value_bytes }
    } else {
        CostModel::Cells
    };
    let selection = select_block_size_from(values, cfg.candidates, &model);
    let table = BlockTable::compile(values, selection.block_size, placeholder)?;

    // Run a quick sanity check to ensure that the table works as expected.
    if let Some(cp) = table.mismatch(values) {
        bail!("table sanity check failed for U+{cp:04X}");
    }

    let size = emitter.encoded_size(&table);
    tracing::info!(
        table = cfg.name,
        block_size = table.block_size(),
        blocks = table.block_count(),
        sub_arrays = table.sub_arrays().len(),
        cost = selection.cost,
        cost_model = model.name(),
        bytes = size,
        "compiled table"
    );

    emitter.emit(source, &table);
    Ok((table, size))
}

fn persist<T: FixedWidth>(ctx: &Settings, table: &BlockTable<T>) -> anyhow::Result<Option<Vec<u8>>> {
    if !ctx.binary {
        return Ok(None);
    }
    Ok(Some(table.to_bytes()?))
}

fn lang_type(ctx: &Settings, rust: &'static str, cpp: &'static str) -> &'static str {
    match ctx.lang {
        Language::Cpp => cpp,
        Language::Rust => rust,
    }
}

fn build_general_category(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
) -> anyhow::Result<TableOutput> {
    let mut names = Interner::with_default("Cn");
    let mut dense = DenseArray::new(0u16);
    for record in parse_unicode_data(text)? {
        let id = names.intern(record.general_category)?;
        dense.assign(record.range, id)?;
    }
    finish_enum(ctx, cfg, "GeneralCategory", &names, dense.as_slice())
}

fn build_block(ctx: &Settings, cfg: &TableConfig, text: &str) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "Block", text)
}

fn build_script(ctx: &Settings, cfg: &TableConfig, text: &str) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "Script", text)
}

fn build_grapheme_break(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "GraphemeBreak", text)
}

fn build_word_break(ctx: &Settings, cfg: &TableConfig, text: &str) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "WordBreak", text)
}

fn build_sentence_break(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "SentenceBreak", text)
}

fn build_emoji(ctx: &Settings, cfg: &TableConfig, text: &str) -> anyhow::Result<TableOutput> {
    build_enum_from_ranges(ctx, cfg, "Emoji", text)
}

/// Enum-valued tables: unlisted codepoints are `Unassigned`,
/// and later lines override earlier ones.
fn build_enum_from_ranges(
    ctx: &Settings,
    cfg: &TableConfig,
    type_name: &str,
    text: &str,
) -> anyhow::Result<TableOutput> {
    let mut names = Interner::with_default("Unassigned");
    let mut dense = DenseArray::new(0u16);
    for a in parse_range_assignments(text)? {
        let id = names.intern(&to_identifier(a.value))?;
        dense.assign(a.range, id)?;
    }
    finish_enum(ctx, cfg, type_name, &names, dense.as_slice())
}

fn finish_enum(
    ctx: &Settings,
    cfg: &TableConfig,
    type_name: &str,
    names: &Interner,
    values: &[u16],
) -> anyhow::Result<TableOutput> {
    let variants = names.names();
    let mut source = String::new();

    match ctx.lang {
        Language::Rust => {
            _ = writeln!(
                source,
                "#[repr(u16)]\n#[allow(non_camel_case_types)]\n\
                 #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\npub enum {type_name} {{"
            );
        }
        Language::Cpp => {
            _ = writeln!(source, "enum class {type_name} : uint16_t {{");
        }
    }
    for v in variants {
        _ = writeln!(source, "    {v},");
    }
    source.push_str(if ctx.lang == Language::Cpp { "};\n" } else { "}\n" });

    let format = |buf: &mut String, id: &u16| {
        _ = write!(buf, "{type_name}::{}", variants[*id as usize]);
    };
    let emitter = TableEmitter::new(ctx.lang, cfg.name, type_name, &format).with_value_bytes(2);
    let (table, size) = compile(ctx, cfg, values, 0, emitter, &|_| 2, &mut source)?;

    Ok(TableOutput { name: cfg.name, source, binary: persist(ctx, &table)?, size })
}

fn build_properties(ctx: &Settings, cfg: &TableConfig, text: &str) -> anyhow::Result<TableOutput> {
    let (names, values) = collect_flags(text, 64)?;
    let ty = lang_type(ctx, "u64", "uint64_t");
    finish_flags(ctx, cfg, ty, &names, &values)
}

fn build_derived_core_properties(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
) -> anyhow::Result<TableOutput> {
    let (names, values) = collect_flags(text, 32)?;
    let values: Vec<u32> = values.into_iter().map(|v| v as u32).collect();
    let ty = lang_type(ctx, "u32", "uint32_t");
    finish_flags(ctx, cfg, ty, &names, &values)
}

/// Bit-flag tables: each distinct value name gets the next bit, in order of appearance.
/// Enumerated properties listed in the same file (`InCB; Linker`) aren't flags and are skipped.
fn collect_flags(text: &str, bits: usize) -> anyhow::Result<(Interner, Vec<u64>)> {
    let mut names = Interner::new();
    let mut dense = DenseArray::new(0u64);
    for a in parse_range_assignments(text)?.into_iter().filter(|a| a.qualifier.is_none()) {
        let bit = names.intern(a.value)? as usize;
        if bit >= bits {
            bail!("more than {bits} distinct properties, {:?} doesn't fit", a.value);
        }
        dense.update(a.range, |v| *v |= 1 << bit)?;
    }
    Ok((names, dense.into_vec()))
}

fn finish_flags<T>(
    ctx: &Settings,
    cfg: &TableConfig,
    ty: &'static str,
    names: &Interner,
    values: &[T],
) -> anyhow::Result<TableOutput>
where
    T: Clone + PartialEq + Sync + Default + std::fmt::LowerHex + FixedWidth,
{
    let mut source = String::new();
    let prefix = cfg.name.to_ascii_uppercase();
    for (bit, name) in names.names().iter().enumerate() {
        let name = name.to_ascii_uppercase();
        match ctx.lang {
            Language::Rust => {
                _ = writeln!(source, "pub const {prefix}_{name}: {ty} = 1 << {bit};");
            }
            Language::Cpp => {
                _ = writeln!(source, "constexpr {ty} {prefix}_{name} = {ty}(1) << {bit};");
            }
        }
    }

    let format = format_hex::<T>;
    let emitter = TableEmitter::new(ctx.lang, cfg.name, ty, &format);
    let (table, size) =
        compile(ctx, cfg, values, T::default(), emitter, &|_| size_of::<T>(), &mut source)?;

    Ok(TableOutput { name: cfg.name, source, binary: persist(ctx, &table)?, size })
}

/// Ids into `SCRIPT_EXTENSIONS`, whose entries are lists of the `Script` enum
/// emitted by the `script` table.
fn build_script_extension_id(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
    aliases: &str,
) -> anyhow::Result<TableOutput> {
    let ext = parse_script_extensions(text)?;
    let scripts = parse_property_value_aliases(aliases, "sc")?;

    let mut groups = Vec::with_capacity(ext.groups.len());
    for group in &ext.groups {
        let variants = group
            .iter()
            .map(|code| match scripts.get(code) {
                Some(long) => Ok(format!("Script::{}", to_identifier(long))),
                None => bail!("unknown script code {code:?}"),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        groups.push(variants.join(", "));
    }

    let mut dense = DenseArray::new(-1i32);
    for (range, id) in ext.assignments {
        dense.assign(range, id)?;
    }

    let mut source = String::new();
    match ctx.lang {
        Language::Rust => {
            _ = writeln!(source, "pub static SCRIPT_EXTENSIONS: [&[Script]; {}] = [", groups.len());
            for group in &groups {
                _ = writeln!(source, "    &[{group}],");
            }
            source.push_str("];\n");
        }
        Language::Cpp => {
            source.push_str(
                "static const std::vector<std::vector<Script>> s_script_extensions = {\n",
            );
            for group in &groups {
                _ = writeln!(source, "    {{ {group} }},");
            }
            source.push_str("};\n");
        }
    }

    let ty = lang_type(ctx, "i32", "int32_t");
    let format = format_decimal::<i32>;
    let emitter = TableEmitter::new(ctx.lang, cfg.name, ty, &format);
    let (table, size) = compile(ctx, cfg, dense.as_slice(), -1, emitter, &|_| 4, &mut source)?;

    Ok(TableOutput { name: cfg.name, source, binary: persist(ctx, &table)?, size })
}

/// The combining class and decomposition of a codepoint.
#[derive(Clone, Default, PartialEq, Eq)]
struct NormalizationEntry<'a> {
    combining_class: u8,
    compat_format: Option<&'a str>,
    codes: Vec<u32>,
}

impl NormalizationEntry<'_> {
    fn encoded_size(&self) -> usize {
        // class + tag pointer + codes pointer, and the codes themselves.
        1 + 2 * size_of::<usize>() + 4 * self.codes.len()
    }
}

fn build_normalization(
    ctx: &Settings,
    cfg: &TableConfig,
    text: &str,
) -> anyhow::Result<TableOutput> {
    let mut dense = DenseArray::new(NormalizationEntry::default());
    for record in parse_unicode_data(text)? {
        let (compat_format, codes) = parse_decomposition(record.decomposition)
            .with_context(|| format!("U+{:04X}", record.range.start()))?;
        let entry =
            NormalizationEntry { combining_class: record.combining_class, compat_format, codes };
        dense.assign(record.range, entry)?;
    }

    let mut source = String::new();
    let format: ValueFormatter<NormalizationEntry> = match ctx.lang {
        Language::Rust => {
            _ = writedoc!(
                source,
                "
                #[derive(Clone, Copy, Debug, PartialEq, Eq)]
                pub struct NormalizationProperties {{
                    pub combining_class: u8,
                    pub compat_format: Option<&'static str>,
                    pub codes: &'static [u32],
                }}
                impl NormalizationProperties {{
                    const fn new(combining_class: u8, compat_format: Option<&'static str>, codes: &'static [u32]) -> Self {{
                        Self {{ combining_class, compat_format, codes }}
                    }}
                }}
                "
            );
            &format_normalization_rust
        }
        Language::Cpp => {
            _ = writedoc!(
                source,
                "
                struct NormalizationProperties {{
                  int combining_class;
                  const char *compat_format;
                  const char32_t *codes;
                }};
                "
            );
            &format_normalization_cpp
        }
    };

    let emitter = TableEmitter::new(ctx.lang, cfg.name, "NormalizationProperties", format)
        .with_value_bytes(1 + 2 * size_of::<usize>())
        .with_columns(4);
    let (_, size) = compile(
        ctx,
        cfg,
        dense.as_slice(),
        NormalizationEntry::default(),
        emitter,
        &NormalizationEntry::encoded_size,
        &mut source,
    )?;

    if ctx.binary {
        tracing::warn!(
            table = cfg.name,
            "records have no fixed-width encoding, skipping binary output"
        );
    }
    Ok(TableOutput { name: cfg.name, source, binary: None, size })
}

fn format_normalization_rust(buf: &mut String, e: &NormalizationEntry) {
    _ = write!(
        buf,
        "NormalizationProperties::new({}, {:?}, &[",
        e.combining_class, e.compat_format
    );
    for (i, cp) in e.codes.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        _ = write!(buf, "{cp:#x}");
    }
    buf.push_str("])");
}

fn format_normalization_cpp(buf: &mut String, e: &NormalizationEntry) {
    _ = write!(buf, "{{ {}, ", e.combining_class);
    match e.compat_format {
        Some(tag) => {
            _ = write!(buf, "\"{tag}\", ");
        }
        None => buf.push_str("nullptr, "),
    }
    if e.codes.is_empty() {
        buf.push_str("nullptr }");
    } else {
        buf.push_str("U\"");
        for cp in &e.codes {
            _ = write!(buf, "\\U{cp:08X}");
        }
        buf.push_str("\" }");
    }
}
