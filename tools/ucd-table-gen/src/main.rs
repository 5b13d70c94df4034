// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::new_without_default)]

mod properties;
mod ucd;

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use blocktab::codegen::Language;
use indoc::writedoc;
use rayon::prelude::*;

use crate::properties::{Settings, TABLES, TableConfig, TableOutput};

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum Format {
    #[default]
    Source,
    Binary,
}

#[derive(Default)]
struct Output {
    arg_lang: Language,
    arg_format: Format,
    arg_measured_cost: bool,
    arg_tables: Vec<String>,

    description: String,
    tables: Vec<TableOutput>,
    total_size: usize,
}

impl Output {
    fn args(&self) -> String {
        let mut buf = String::new();
        match self.arg_lang {
            Language::Cpp => buf.push_str("--lang=cpp"),
            Language::Rust => buf.push_str("--lang=rust"),
        }
        if self.arg_measured_cost {
            buf.push_str(" --measured-cost")
        }
        for t in &self.arg_tables {
            _ = write!(buf, " --table={t}");
        }
        buf
    }
}

const HELP: &str = "\
Usage: ucd-table-gen [options...] <UCD_DIR>
  -h, --help            Prints help information
  --lang=<cpp|rust>     Output language (default: rust)
  --format=<src|bin>    Emit source code (default), or one binary table per property
  --out=<path>          Output file for --format=src (default: stdout),
                        output directory for --format=bin (required)
  --table=<name>        Only build the named table. May be given multiple times
  --measured-cost       Rank block sizes by their encoded size in bytes
                        instead of counting every value as one cell

Tables: general_category, properties, derived_core_properties, block, script,
        script_extension_id, normalization, grapheme_break, word_break,
        sentence_break, emoji

Download the UCD at:
  https://www.unicode.org/Public/UCD/latest/ucd/
";

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        eprint!("{HELP}");
        return Ok(());
    }

    let mut out = Output {
        arg_lang: args
            .opt_value_from_fn("--lang", |arg| match arg {
                "cpp" => Ok(Language::Cpp),
                "rust" => Ok(Language::Rust),
                l => bail!("invalid language: \"{}\"", l),
            })?
            .unwrap_or_default(),
        arg_format: args
            .opt_value_from_fn("--format", |arg| match arg {
                "src" => Ok(Format::Source),
                "bin" => Ok(Format::Binary),
                f => bail!("invalid format: \"{}\"", f),
            })?
            .unwrap_or_default(),
        arg_measured_cost: args.contains("--measured-cost"),
        arg_tables: args.values_from_str("--table")?,
        ..Default::default()
    };
    let arg_out = args
        .opt_value_from_os_str("--out", |s| -> Result<PathBuf, &'static str> { Ok(s.into()) })?;
    let arg_input = args.free_from_os_str(|s| -> Result<PathBuf, &'static str> { Ok(s.into()) })?;
    let arg_remaining = args.finish();
    if !arg_remaining.is_empty() {
        bail!("unrecognized arguments: {:?}", arg_remaining);
    }
    if out.arg_format == Format::Binary && arg_out.is_none() {
        bail!("--format=bin requires --out=<directory>");
    }

    let tables = select_tables(&out.arg_tables)?;
    let settings = Settings {
        lang: out.arg_lang,
        binary: out.arg_format == Format::Binary,
        measured_cost: out.arg_measured_cost,
    };

    out.description = describe_ucd(&arg_input);
    tracing::info!(ucd = %out.description, tables = tables.len(), "building tables");

    // Every table is independent of the others. The output keeps the catalogue order.
    out.tables = tables
        .par_iter()
        .map(|t| t.build(&settings, &arg_input))
        .collect::<anyhow::Result<Vec<_>>>()?;
    out.total_size = out.tables.iter().map(|t| t.size).sum();
    tracing::info!(total_size = out.total_size, "all tables compiled");

    match (out.arg_format, arg_out) {
        (Format::Binary, Some(dir)) => write_binaries(&out, &dir),
        (_, path) => {
            let buf = match out.arg_lang {
                Language::Cpp => generate_cpp(out),
                Language::Rust => generate_rust(out),
            };
            match path {
                Some(path) => std::fs::write(&path, buf)
                    .with_context(|| format!("failed to write {}", path.display())),
                None => Ok(std::io::stdout().write_all(buf.as_bytes())?),
            }
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    // stdout is reserved for the generated source.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn select_tables(names: &[String]) -> anyhow::Result<Vec<&'static TableConfig>> {
    if names.is_empty() {
        return Ok(TABLES.iter().collect());
    }
    names
        .iter()
        .map(|n| TABLES.iter().find(|t| t.name == *n).with_context(|| format!("unknown table: {n:?}")))
        .collect()
}

/// The version line of the UCD, e.g. `PropList-15.1.0` from the first line of PropList.txt.
fn describe_ucd(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("PropList.txt"))
        .ok()
        .and_then(|text| {
            let line = text.lines().next()?;
            let name = line.strip_prefix('#')?.trim();
            Some(name.strip_suffix(".txt").unwrap_or(name).to_string())
        })
        .unwrap_or_else(|| dir.display().to_string())
}

fn write_binaries(out: &Output, dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for t in &out.tables {
        let Some(bytes) = &t.binary else { continue };
        let path = dir.join(format!("{}.btab", t.name));
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(table = t.name, path = %path.display(), bytes = bytes.len(), "wrote table");
    }
    Ok(())
}

fn generate_cpp(out: Output) -> String {
    let mut buf = String::new();

    _ = writedoc!(
        buf,
        "
        // BEGIN: Generated by ucd-table-gen on {}, from {}, with {}, {} bytes
        // clang-format off
        #pragma once

        #include <cstdint>
        #include <vector>

        ",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        out.description,
        out.args(),
        out.total_size,
    );

    for t in &out.tables {
        buf.push_str(&t.source);
    }

    buf.push_str("// clang-format on\n// END: Generated by ucd-table-gen\n");
    buf
}

fn generate_rust(out: Output) -> String {
    let mut buf = String::new();

    _ = writeln!(
        buf,
        "// BEGIN: Generated by ucd-table-gen on {}, from {}, with {}, {} bytes",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        out.description,
        out.args(),
        out.total_size,
    );

    for t in &out.tables {
        buf.push_str(&t.source);
    }

    buf.push_str("// END: Generated by ucd-table-gen\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let out = Output {
            arg_lang: Language::Cpp,
            arg_measured_cost: true,
            arg_tables: vec!["script".to_string(), "block".to_string()],
            ..Default::default()
        };
        assert_eq!(out.args(), "--lang=cpp --measured-cost --table=script --table=block");
    }

    #[test]
    fn test_select_tables() {
        assert_eq!(select_tables(&[]).unwrap().len(), TABLES.len());

        let picked = select_tables(&["emoji".to_string(), "block".to_string()]).unwrap();
        let names: Vec<_> = picked.iter().map(|t| t.name).collect();
        assert_eq!(names, ["emoji", "block"]);

        assert!(select_tables(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_describe_ucd_falls_back_to_path() {
        let dir = Path::new("/nonexistent/ucd");
        assert_eq!(describe_ucd(dir), "/nonexistent/ucd");
    }

    #[test]
    fn test_generate_rust_wraps_tables() {
        let out = Output {
            description: "PropList-15.1.0".to_string(),
            tables: vec![TableOutput {
                name: "demo",
                source: "static DEMO: u8 = 0;\n".to_string(),
                binary: None,
                size: 1,
            }],
            total_size: 1,
            ..Default::default()
        };
        let buf = generate_rust(out);
        assert!(buf.starts_with("// BEGIN: Generated by ucd-table-gen on "));
        assert!(buf.contains(", from PropList-15.1.0, with --lang=rust, 1 bytes\n"));
        assert!(buf.ends_with("static DEMO: u8 = 0;\n// END: Generated by ucd-table-gen\n"));
    }
}
