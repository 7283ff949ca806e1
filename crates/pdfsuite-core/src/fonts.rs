//! Fonts for watermark text
//!
//! Plain ASCII text is set in the built-in Helvetica with WinAnsi encoding,
//! which needs no font program. Anything else needs a TrueType font, which
//! is fetched through a [`FontSource`] and embedded as a Type0 font with
//! Identity-H encoding.

use crate::error::PdfSuiteError;
use crate::placement::TextExtent;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;

/// Helvetica advance widths for codes 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];
const HELVETICA_ASCENT: f64 = 718.0;
const HELVETICA_DESCENT: f64 = -207.0;

/// What the text needs from a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    /// Printable ASCII only; covered by the standard 14 fonts.
    Latin,
    /// Anything else; needs an embedded font.
    Unicode,
}

impl Script {
    pub fn for_text(text: &str) -> Self {
        if text.chars().all(|c| (' '..='~').contains(&c)) {
            Script::Latin
        } else {
            Script::Unicode
        }
    }
}

/// Raw TrueType font as supplied by a font source.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    pub name: String,
    pub data: Vec<u8>,
}

/// Supplies font programs for text the standard fonts cannot show.
pub trait FontSource {
    fn load(&self, script: Script) -> Result<LoadedFont, PdfSuiteError>;
}

/// Font source for contexts with no font available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFontSource;

impl FontSource for NoFontSource {
    fn load(&self, script: Script) -> Result<LoadedFont, PdfSuiteError> {
        Err(PdfSuiteError::FontUnavailable(format!(
            "no font configured for {:?} text",
            script
        )))
    }
}

/// Font source backed by bytes already in memory.
#[derive(Debug, Clone)]
pub struct StaticFontSource {
    font: LoadedFont,
}

impl StaticFontSource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            font: LoadedFont {
                name: name.into(),
                data,
            },
        }
    }
}

impl FontSource for StaticFontSource {
    fn load(&self, _script: Script) -> Result<LoadedFont, PdfSuiteError> {
        Ok(self.font.clone())
    }
}

/// A parsed TrueType font ready to be embedded.
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    name: String,
    data: Vec<u8>,
    units_per_em: f64,
    ascent: f64,
    descent: f64,
    bbox: [i64; 4],
}

impl TrueTypeFont {
    pub fn parse(font: LoadedFont) -> Result<Self, PdfSuiteError> {
        let face = ttf_parser::Face::parse(&font.data, 0)
            .map_err(|e| PdfSuiteError::FontUnavailable(format!("{}: {}", font.name, e)))?;
        let units_per_em = face.units_per_em().max(1) as f64;
        let ascent = face.ascender() as f64;
        let descent = face.descender() as f64;
        let bb = face.global_bounding_box();
        let bbox = [
            bb.x_min as i64,
            bb.y_min as i64,
            bb.x_max as i64,
            bb.y_max as i64,
        ];
        Ok(Self {
            name: sanitize_font_name(&font.name),
            data: font.data,
            units_per_em,
            ascent,
            descent,
            bbox,
        })
    }

    /// Glyph id and advance (font units) for each character.
    fn glyphs(&self, text: &str) -> Result<Vec<(char, u16, u16)>, PdfSuiteError> {
        let face = ttf_parser::Face::parse(&self.data, 0)
            .map_err(|e| PdfSuiteError::FontUnavailable(e.to_string()))?;
        text.chars()
            .map(|c| {
                let gid = face.glyph_index(c).ok_or_else(|| {
                    PdfSuiteError::FontUnavailable(format!(
                        "font {} has no glyph for {:?}",
                        self.name, c
                    ))
                })?;
                let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                Ok((c, gid.0, advance))
            })
            .collect()
    }

    /// Scale factor from font units to the PDF 1000-unit glyph space.
    fn to_glyph_space(&self, units: f64) -> f64 {
        units * 1000.0 / self.units_per_em
    }
}

/// The font a watermark is drawn with.
#[derive(Debug, Clone)]
pub enum WatermarkFont {
    Helvetica,
    TrueType(TrueTypeFont),
}

impl WatermarkFont {
    /// Pick a font able to show every string in `texts`.
    pub fn for_texts<'a, I>(texts: I, source: &dyn FontSource) -> Result<Self, PdfSuiteError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let needs_unicode = texts
            .into_iter()
            .any(|t| Script::for_text(t) == Script::Unicode);
        if !needs_unicode {
            return Ok(WatermarkFont::Helvetica);
        }
        let loaded = source.load(Script::Unicode)?;
        tracing::debug!(font = %loaded.name, bytes = loaded.data.len(), "loaded watermark font");
        Ok(WatermarkFont::TrueType(TrueTypeFont::parse(loaded)?))
    }

    /// Ascent and descent in 1/1000 em (descent is negative).
    fn vertical_metrics(&self) -> (f64, f64) {
        match self {
            WatermarkFont::Helvetica => (HELVETICA_ASCENT, HELVETICA_DESCENT),
            WatermarkFont::TrueType(f) => {
                (f.to_glyph_space(f.ascent), f.to_glyph_space(f.descent))
            }
        }
    }

    pub fn width_of(&self, text: &str, font_size: f64) -> Result<f64, PdfSuiteError> {
        let units: f64 = match self {
            WatermarkFont::Helvetica => text
                .chars()
                .map(|c| {
                    let code = c as usize;
                    if (32..=126).contains(&code) {
                        HELVETICA_WIDTHS[code - 32] as f64
                    } else {
                        // not reachable for Latin text
                        556.0
                    }
                })
                .sum(),
            WatermarkFont::TrueType(f) => f
                .glyphs(text)?
                .iter()
                .map(|&(_, _, adv)| f.to_glyph_space(adv as f64))
                .sum(),
        };
        Ok(units * font_size / 1000.0)
    }

    /// Distance from the baseline down to the bottom of the text box.
    pub fn descent_at(&self, font_size: f64) -> f64 {
        -self.vertical_metrics().1 * font_size / 1000.0
    }

    /// Bounding box of `text` at `font_size`, from descender to ascender.
    pub fn extent(&self, text: &str, font_size: f64) -> Result<TextExtent, PdfSuiteError> {
        let (ascent, descent) = self.vertical_metrics();
        Ok(TextExtent {
            width: self.width_of(text, font_size)?,
            height: (ascent - descent) * font_size / 1000.0,
        })
    }

    /// The string operand for `Tj`.
    pub fn encode(&self, text: &str) -> Result<Object, PdfSuiteError> {
        match self {
            WatermarkFont::Helvetica => Ok(Object::String(
                text.as_bytes().to_vec(),
                StringFormat::Literal,
            )),
            WatermarkFont::TrueType(f) => {
                let mut bytes = Vec::new();
                for (_, gid, _) in f.glyphs(text)? {
                    bytes.extend_from_slice(&gid.to_be_bytes());
                }
                Ok(Object::String(bytes, StringFormat::Hexadecimal))
            }
        }
    }

    /// Add the font to `doc`, covering every glyph used by `texts`.
    pub fn install<'a, I>(&self, doc: &mut Document, texts: I) -> Result<ObjectId, PdfSuiteError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            WatermarkFont::Helvetica => Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })),
            WatermarkFont::TrueType(f) => {
                let mut used: BTreeMap<u16, (char, u16)> = BTreeMap::new();
                for text in texts {
                    for (c, gid, adv) in f.glyphs(text)? {
                        used.entry(gid).or_insert((c, adv));
                    }
                }
                Ok(install_type0(doc, f, &used))
            }
        }
    }
}

fn install_type0(
    doc: &mut Document,
    font: &TrueTypeFont,
    used: &BTreeMap<u16, (char, u16)>,
) -> ObjectId {
    let font_file = Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.clone(),
    );
    let font_file_id = doc.add_object(font_file);

    let bbox: Vec<Object> = font
        .bbox
        .iter()
        .map(|&v| Object::Integer(font.to_glyph_space(v as f64).round() as i64))
        .collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(font.name.clone().into_bytes()),
        "Flags" => 4,
        "FontBBox" => bbox,
        "ItalicAngle" => 0,
        "Ascent" => font.to_glyph_space(font.ascent).round() as i64,
        "Descent" => font.to_glyph_space(font.descent).round() as i64,
        "CapHeight" => font.to_glyph_space(font.ascent).round() as i64,
        "StemV" => 80,
        "FontFile2" => Object::Reference(font_file_id),
    });

    let mut widths = Vec::with_capacity(used.len() * 2);
    for (&gid, &(_, adv)) in used {
        widths.push(Object::Integer(gid as i64));
        widths.push(Object::Array(vec![Object::Integer(
            font.to_glyph_space(adv as f64).round() as i64,
        )]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(font.name.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let cmap = to_unicode_cmap(used);
    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), cmap.into_bytes()));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(font.name.clone().into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => Object::Reference(to_unicode_id),
    })
}

fn to_unicode_cmap(used: &BTreeMap<u16, (char, u16)>) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<_> = used.iter().collect();
    // bfchar blocks hold at most 100 entries
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (&gid, &(c, _)) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_detection() {
        assert_eq!(Script::for_text("CONFIDENTIAL 2024"), Script::Latin);
        assert_eq!(Script::for_text("Page {page} of {total}"), Script::Latin);
        assert_eq!(Script::for_text(""), Script::Latin);
        assert_eq!(Script::for_text("机密"), Script::Unicode);
        assert_eq!(Script::for_text("Café"), Script::Unicode);
    }

    #[test]
    fn test_helvetica_widths() {
        let font = WatermarkFont::Helvetica;
        // H=722 e=556 l=222 l=222 o=556
        let width = font.width_of("Hello", 10.0).unwrap();
        assert!((width - 22.78).abs() < 1e-9);
        assert_eq!(font.width_of("", 48.0).unwrap(), 0.0);
    }

    #[test]
    fn test_helvetica_extent_height() {
        let extent = WatermarkFont::Helvetica.extent("A", 100.0).unwrap();
        assert!((extent.height - 92.5).abs() < 1e-9);
        assert!((WatermarkFont::Helvetica.descent_at(100.0) - 20.7).abs() < 1e-9);
    }

    #[test]
    fn test_latin_text_needs_no_font_source() {
        let font = WatermarkFont::for_texts(["DRAFT", "Page 1"], &NoFontSource).unwrap();
        assert!(matches!(font, WatermarkFont::Helvetica));
    }

    #[test]
    fn test_unicode_text_without_source_is_font_error() {
        let err = WatermarkFont::for_texts(["DRAFT", "草稿"], &NoFontSource).unwrap_err();
        assert!(matches!(err, PdfSuiteError::FontUnavailable(_)));
    }

    #[test]
    fn test_garbage_font_bytes_are_font_error() {
        let source = StaticFontSource::new("Broken", vec![0, 1, 2, 3]);
        let err = WatermarkFont::for_texts(["草稿"], &source).unwrap_err();
        assert!(matches!(err, PdfSuiteError::FontUnavailable(_)));
    }

    #[test]
    fn test_helvetica_encode_is_literal() {
        let obj = WatermarkFont::Helvetica.encode("DRAFT").unwrap();
        assert_eq!(obj, Object::String(b"DRAFT".to_vec(), StringFormat::Literal));
    }

    #[test]
    fn test_install_helvetica() {
        let mut doc = Document::with_version("1.7");
        let id = WatermarkFont::Helvetica.install(&mut doc, ["x"]).unwrap();
        let dict = doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }

    #[test]
    fn test_to_unicode_cmap_entries() {
        let mut used = BTreeMap::new();
        used.insert(3u16, ('A', 600u16));
        used.insert(0x1F0u16, ('机', 1000u16));
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<01F0> <673A>"));
    }

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(sanitize_font_name("Noto Sans CJK"), "NotoSansCJK");
        assert_eq!(sanitize_font_name("  "), "EmbeddedFont");
    }
}
