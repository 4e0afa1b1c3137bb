//! Reading, translating and writing whole `.docx` packages.
use crate::ooxml::docx::fonts::{FONT_TABLE_PART, MODERN_FONT_TABLE};
use crate::ooxml::docx::pipeline::{PartReport, PartTranslator, is_translatable_part};
use crate::ooxml::docx::resolve::StyleResolver;
use crate::ooxml::error::{OoxmlError, Result};
use crate::translate::config::TranslateOptions;
use crate::translate::translator::Translator;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Main document part of a package.
pub const DOCUMENT_PART: &str = "word/document.xml";
/// Style sheet part of a package.
pub const STYLES_PART: &str = "word/styles.xml";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    stored: bool,
}

/// The entries of a `.docx` ZIP container, in archive order.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<Entry>,
}

impl DocxPackage {
    /// Create an empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every entry of a ZIP archive held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
                stored: file.compression() == CompressionMethod::Stored,
            });
        }
        tracing::debug!(entries = entries.len(), "package read");
        Ok(Self { entries })
    }

    /// Read a package from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Names of all file entries, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|e| !e.is_dir).map(|e| e.name.as_str())
    }

    /// Contents of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Whether the package holds a part called `name`.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Replace the contents of a part, or append it when it is new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| !e.is_dir && e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                is_dir: false,
                stored: false,
            }),
        }
    }

    /// Write the package as a ZIP archive, keeping the entry order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let method = if entry.stored {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Write the package to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Style resolver over the package's `word/styles.xml`, if it has a
    /// readable one.
    pub fn style_resolver(&self) -> Option<StyleResolver> {
        let bytes = self.part(STYLES_PART)?;
        match StyleResolver::from_styles_xml(bytes) {
            Ok(resolver) => Some(resolver),
            Err(err) => {
                tracing::warn!(error = %err, "unreadable style sheet, styles not materialized");
                None
            },
        }
    }
}

/// Translate every recognized part of `package` in place.
///
/// With `custom_styles`, that style sheet replaces `word/styles.xml`
/// before anything else happens and drives materialization.
/// With [`TranslateOptions::modern_font_table`], an existing
/// `word/fontTable.xml` is replaced by [`MODERN_FONT_TABLE`].
///
/// # Errors
///
/// Fails when the package has no main document part or `custom_styles`
/// is not a valid style sheet. Problems inside a part are reported in its
/// [`PartReport`] instead.
pub fn translate_package(
    package: &mut DocxPackage,
    translator: &dyn Translator,
    options: &TranslateOptions,
    custom_styles: Option<&[u8]>,
) -> Result<Vec<PartReport>> {
    options.validate()?;
    if !package.contains(DOCUMENT_PART) {
        return Err(OoxmlError::PartNotFound(DOCUMENT_PART.to_string()));
    }
    if let Some(styles) = custom_styles {
        StyleResolver::from_styles_xml(styles)?;
        package.set_part(STYLES_PART, styles.to_vec());
        tracing::info!(target: "pomelo::audit", "custom style sheet installed");
    }
    if options.modern_font_table && package.contains(FONT_TABLE_PART) {
        package.set_part(FONT_TABLE_PART, MODERN_FONT_TABLE.as_bytes().to_vec());
        tracing::info!(target: "pomelo::audit", "modern font table installed");
    }

    let mut parts = PartTranslator::new(translator, options.clone());
    if let Some(resolver) = package.style_resolver() {
        parts = parts.with_styles(resolver);
    }

    let names: Vec<String> = package
        .part_names()
        .filter(|n| is_translatable_part(n))
        .map(str::to_string)
        .collect();
    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let Some(bytes) = package.part(&name) else {
            continue;
        };
        let (out, report) = parts.translate_part_with_report(&name, bytes);
        package.set_part(&name, out);
        reports.push(report);
    }
    Ok(reports)
}

/// Translate the `.docx` at `input` into a new file at `output`.
pub fn translate_docx(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    translator: &dyn Translator,
    options: &TranslateOptions,
    custom_styles: Option<&[u8]>,
) -> Result<Vec<PartReport>> {
    let input = input.as_ref();
    let output = output.as_ref();
    tracing::info!(input = %input.display(), output = %output.display(), "translating document");
    let mut package = DocxPackage::open(input)?;
    let reports = translate_package(&mut package, translator, options, custom_styles)?;
    package.save(output)?;
    Ok(reports)
}
