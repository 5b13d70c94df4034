// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Readers for the plain-text UCD files and the dense arrays they get expanded into.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use anyhow::{Context, bail};
use blocktab::{DOMAIN_LEN, MAX_CODEPOINT};

/// `XXXX` or `XXXX..YYYY` mapped to the value in the second column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeAssignment<'a> {
    pub range: RangeInclusive<u32>,
    pub value: &'a str,
    /// The third column of lines like `094D ; InCB; Linker`, which give a property a value
    /// instead of listing a binary property.
    pub qualifier: Option<&'a str>,
}

/// Parses the `range ; value # comment` layout shared by most UCD files
/// (PropList, Scripts, Blocks, the break properties, emoji-data, ...).
/// Columns after the third one are ignored.
pub fn parse_range_assignments(text: &str) -> anyhow::Result<Vec<RangeAssignment<'_>>> {
    let mut out = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = strip_comment(line);
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(';').map(str::trim);
        let range = fields.next().unwrap_or_default();
        let value = fields.next().unwrap_or_default();
        if value.is_empty() {
            bail!("line {}: missing value in {:?}", line_no + 1, line);
        }
        let qualifier = fields.next().filter(|q| !q.is_empty());
        let range = parse_range(range).with_context(|| format!("line {}", line_no + 1))?;
        out.push(RangeAssignment { range, value, qualifier });
    }

    Ok(out)
}

/// One line of UnicodeData.txt, or a `<..., First>`/`<..., Last>` pair folded into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeDataRecord<'a> {
    pub range: RangeInclusive<u32>,
    pub general_category: &'a str,
    pub combining_class: u8,
    pub decomposition: &'a str,
}

pub fn parse_unicode_data(text: &str) -> anyhow::Result<Vec<UnicodeDataRecord<'_>>> {
    let mut out: Vec<UnicodeDataRecord> = Vec::new();
    let mut pending_first: Option<(usize, u32)> = None;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() < 6 {
            bail!("line {}: expected at least 6 fields, got {}", line_no + 1, fields.len());
        }

        let cp = parse_codepoint(fields[0]).with_context(|| format!("line {}", line_no + 1))?;
        let name = fields[1];
        let combining_class = fields[3]
            .parse()
            .with_context(|| format!("line {}: bad combining class {:?}", line_no + 1, fields[3]))?;

        if let Some((first_line, first)) = pending_first.take() {
            if !name.ends_with(", Last>") {
                bail!("line {}: range started on line {} is never closed", line_no + 1, first_line);
            }
            // The whole range takes the category of its closing line.
            out.push(UnicodeDataRecord {
                range: first..=cp,
                general_category: fields[2],
                combining_class,
                decomposition: "",
            });
            continue;
        }

        if name.ends_with(", First>") {
            pending_first = Some((line_no + 1, cp));
            continue;
        }

        out.push(UnicodeDataRecord {
            range: cp..=cp,
            general_category: fields[2],
            combining_class,
            decomposition: fields[5],
        });
    }

    if let Some((line, _)) = pending_first {
        bail!("line {line}: range is never closed");
    }

    Ok(out)
}

/// Splits a UnicodeData decomposition field like `<compat> 0020 0308`
/// into its formatting tag and its codepoints.
pub fn parse_decomposition(field: &str) -> anyhow::Result<(Option<&str>, Vec<u32>)> {
    let field = field.trim();
    let (tag, codes) = match field.strip_prefix('<') {
        Some(rest) => {
            let (tag, codes) = rest.split_once('>').context("unterminated decomposition tag")?;
            (Some(tag), codes)
        }
        None => (None, field),
    };
    let codes = codes.split_whitespace().map(parse_codepoint).collect::<anyhow::Result<_>>()?;
    Ok((tag, codes))
}

/// ScriptExtensions.txt groups its lines under `# Script_Extensions=...` headers.
/// Every group is given the next id, starting at 0.
#[derive(Debug, Default)]
pub struct ScriptExtensions<'a> {
    /// The script codes of each group, indexed by id.
    pub groups: Vec<Vec<&'a str>>,
    pub assignments: Vec<(RangeInclusive<u32>, i32)>,
}

pub fn parse_script_extensions(text: &str) -> anyhow::Result<ScriptExtensions<'_>> {
    let mut out = ScriptExtensions::default();

    for (line_no, line) in text.lines().enumerate() {
        if let Some(scripts) = line.strip_prefix("# Script_Extensions=") {
            out.groups.push(scripts.split_whitespace().collect());
            continue;
        }

        let line = strip_comment(line);
        if line.is_empty() {
            continue;
        }
        let Some(id) = out.groups.len().checked_sub(1) else {
            bail!("line {}: assignment before the first Script_Extensions header", line_no + 1);
        };
        let range = line.split(';').next().unwrap_or_default().trim();
        let range = parse_range(range).with_context(|| format!("line {}", line_no + 1))?;
        out.assignments.push((range, id as i32));
    }

    Ok(out)
}

/// Maps the short and alternate names of `property`'s values in PropertyValueAliases.txt
/// to their long names, e.g. `Arab` to `Arabic` for `sc`.
pub fn parse_property_value_aliases<'a>(
    text: &'a str,
    property: &str,
) -> anyhow::Result<HashMap<&'a str, &'a str>> {
    let mut out = HashMap::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = strip_comment(line);
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields[0] != property {
            continue;
        }
        let [_, short, long, others @ ..] = fields.as_slice() else {
            bail!("line {}: expected at least 3 fields in {:?}", line_no + 1, line);
        };
        for alias in [short, long].into_iter().chain(others) {
            out.insert(*alias, *long);
        }
    }

    Ok(out)
}

/// Turns a UCD value name into an identifier the way the block and property value
/// enums spell them: `Latin-1 Supplement` becomes `Latin1Supplement`.
pub fn to_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name.split([' ', '-']).filter(|w| !w.is_empty()) {
        let is_lower = word.chars().any(char::is_alphabetic)
            && word.chars().all(|c| !c.is_alphabetic() || c.is_lowercase());
        if is_lower {
            let mut chars = word.chars();
            if let Some(c) = chars.next() {
                out.extend(c.to_uppercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(word);
        }
    }
    out
}

/// A value for every codepoint.
pub struct DenseArray<T> {
    values: Vec<T>,
}

impl<T: Clone> DenseArray<T> {
    pub fn new(default: T) -> Self {
        Self { values: vec![default; DOMAIN_LEN] }
    }

    pub fn assign(&mut self, range: RangeInclusive<u32>, value: T) -> anyhow::Result<()> {
        let range = checked_range(range)?;
        self.values[range].fill(value);
        Ok(())
    }

    pub fn update(
        &mut self,
        range: RangeInclusive<u32>,
        f: impl FnMut(&mut T),
    ) -> anyhow::Result<()> {
        let range = checked_range(range)?;
        self.values[range].iter_mut().for_each(f);
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }
}

/// Assigns small integer ids to names in the order they're first seen.
pub struct Interner {
    names: Vec<String>,
    ids: HashMap<String, u16>,
}

impl Interner {
    pub fn new() -> Self {
        Self { names: Vec::new(), ids: HashMap::new() }
    }

    /// An interner whose id 0 is `default`.
    pub fn with_default(default: &str) -> Self {
        let mut interner = Self::new();
        interner.names.push(default.to_string());
        interner.ids.insert(default.to_string(), 0);
        interner
    }

    pub fn intern(&mut self, name: &str) -> anyhow::Result<u16> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let id = u16::try_from(self.names.len()).context("too many distinct values")?;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => line[..i].trim(),
        None => line.trim(),
    }
}

fn parse_codepoint(s: &str) -> anyhow::Result<u32> {
    let s = s.trim();
    let cp = u32::from_str_radix(s, 16).with_context(|| format!("invalid codepoint {s:?}"))?;
    if cp > MAX_CODEPOINT {
        bail!("codepoint U+{cp:04X} is out of range");
    }
    Ok(cp)
}

fn parse_range(s: &str) -> anyhow::Result<RangeInclusive<u32>> {
    let (first, last) = match s.split_once("..") {
        Some((first, last)) => (parse_codepoint(first)?, parse_codepoint(last)?),
        None => {
            let cp = parse_codepoint(s)?;
            (cp, cp)
        }
    };
    if first > last {
        bail!("range U+{first:04X}..U+{last:04X} is reversed");
    }
    Ok(first..=last)
}

fn checked_range(range: RangeInclusive<u32>) -> anyhow::Result<RangeInclusive<usize>> {
    let (first, last) = range.into_inner();
    if first > last || last > MAX_CODEPOINT {
        bail!("range U+{first:04X}..U+{last:04X} is outside of the codepoint domain");
    }
    Ok(first as usize..=last as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_assignments() {
        let text = "\
# PropList-15.1.0.txt

0009..000D    ; White_Space # Cc   [5] <control-0009>..<control-000D>
0020          ; White_Space # Zs       SPACE
094D          ; InCB; Linker # Mn       DEVANAGARI SIGN VIRAMA
";
        let parsed = parse_range_assignments(text).unwrap();
        assert_eq!(
            parsed,
            [
                RangeAssignment { range: 0x9..=0xD, value: "White_Space", qualifier: None },
                RangeAssignment { range: 0x20..=0x20, value: "White_Space", qualifier: None },
                RangeAssignment { range: 0x94D..=0x94D, value: "InCB", qualifier: Some("Linker") },
            ]
        );
    }

    #[test]
    fn test_range_assignments_with_spaces_in_value() {
        let parsed = parse_range_assignments("0080..00FF; Latin-1 Supplement\n").unwrap();
        assert_eq!(parsed[0].value, "Latin-1 Supplement");
    }

    #[test]
    fn test_range_assignments_errors() {
        let err = parse_range_assignments("0041\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(parse_range_assignments("0042..0041 ; X\n").is_err());
        assert!(parse_range_assignments("110000 ; X\n").is_err());
        assert!(parse_range_assignments("zz ; X\n").is_err());
    }

    #[test]
    fn test_unicode_data() {
        let text = "\
0041;LATIN CAPITAL LETTER A;Lu;0;L;;;;;N;;;;0061;
00C0;LATIN CAPITAL LETTER A WITH GRAVE;Lu;0;L;0041 0300;;;;N;LATIN CAPITAL LETTER A GRAVE;;;00E0;
0300;COMBINING GRAVE ACCENT;Mn;230;NSM;;;;;N;NON-SPACING GRAVE;;;;
3400;<CJK Ideograph Extension A, First>;Lo;0;L;;;;;N;;;;;
4DBF;<CJK Ideograph Extension A, Last>;Lo;0;L;;;;;N;;;;;
";
        let records = parse_unicode_data(text).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].decomposition, "0041 0300");
        assert_eq!(records[2].combining_class, 230);
        assert_eq!(records[3].range, 0x3400..=0x4DBF);
        assert_eq!(records[3].general_category, "Lo");
    }

    #[test]
    fn test_unicode_data_unclosed_range() {
        let text = "3400;<CJK Ideograph Extension A, First>;Lo;0;L;;;;;N;;;;;\n";
        assert!(parse_unicode_data(text).is_err());
    }

    #[test]
    fn test_decomposition() {
        assert_eq!(parse_decomposition("").unwrap(), (None, vec![]));
        assert_eq!(parse_decomposition("0041 0300").unwrap(), (None, vec![0x41, 0x300]));
        assert_eq!(
            parse_decomposition("<compat> 0020 0308").unwrap(),
            (Some("compat"), vec![0x20, 0x308])
        );
        assert!(parse_decomposition("<compat 0020").is_err());
    }

    #[test]
    fn test_script_extensions() {
        let text = "\
# Script_Extensions=Arab Syrc

064B..0655    ; Arab Syrc # Mn  [11] ARABIC FATHATAN..ARABIC HAMZA BELOW

# Script_Extensions=Beng Deva

0951          ; Beng Deva # Mn       DEVANAGARI STRESS SIGN UDATTA
";
        let ext = parse_script_extensions(text).unwrap();
        assert_eq!(ext.groups, [vec!["Arab", "Syrc"], vec!["Beng", "Deva"]]);
        assert_eq!(ext.assignments, [(0x64B..=0x655, 0), (0x951..=0x951, 1)]);
        assert!(parse_script_extensions("0951 ; Beng\n").is_err());
    }

    #[test]
    fn test_property_value_aliases() {
        let text = "\
# PropertyValueAliases-15.1.0.txt
ccc; 230; A                          ; Above
sc ; Arab                             ; Arabic
sc ; Zinh                             ; Inherited                        ; Qaai
sc ; Ital                             ; Old_Italic
";
        let aliases = parse_property_value_aliases(text, "sc").unwrap();
        assert_eq!(aliases["Arab"], "Arabic");
        assert_eq!(aliases["Arabic"], "Arabic");
        assert_eq!(aliases["Qaai"], "Inherited");
        assert_eq!(aliases["Ital"], "Old_Italic");
        assert!(!aliases.contains_key("230"));

        assert!(parse_property_value_aliases("sc ; Arab\n", "sc").is_err());
    }

    #[test]
    fn test_to_identifier() {
        assert_eq!(to_identifier("Latin-1 Supplement"), "Latin1Supplement");
        assert_eq!(to_identifier("CJK Unified Ideographs Extension A"), "CJKUnifiedIdeographsExtensionA");
        assert_eq!(to_identifier("Miscellaneous Symbols and Arrows"), "MiscellaneousSymbolsAndArrows");
        assert_eq!(to_identifier("Regional_Indicator"), "Regional_Indicator");
    }

    #[test]
    fn test_dense_array() {
        let mut dense = DenseArray::new(0u8);
        dense.assign(0x41..=0x5A, 1).unwrap();
        dense.update(0x50..=0x60, |v| *v |= 2).unwrap();
        let values = dense.as_slice();
        assert_eq!(values.len(), DOMAIN_LEN);
        assert_eq!(values[0x40], 0);
        assert_eq!(values[0x41], 1);
        assert_eq!(values[0x50], 3);
        assert_eq!(values[0x60], 2);
        assert!(dense.assign(0x10FFFF..=0x110000, 1).is_err());
    }

    #[test]
    fn test_interner() {
        let mut interner = Interner::with_default("Unassigned");
        assert_eq!(interner.intern("Latin").unwrap(), 1);
        assert_eq!(interner.intern("Greek").unwrap(), 2);
        assert_eq!(interner.intern("Latin").unwrap(), 1);
        assert_eq!(interner.intern("Unassigned").unwrap(), 0);
        assert_eq!(interner.names(), ["Unassigned", "Latin", "Greek"]);
    }
}
