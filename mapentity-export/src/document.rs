//! Printable OpenDocument rendering.
//!
//! Templates are `.odt` archives looked up under a template root. Their
//! `content.xml` and `styles.xml` members are rendered with `tera`; the
//! row's map image is embedded as `Pictures/map.png`. The map image and the
//! attribute block come from a [`DocumentSource`] and are never produced
//! here.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use mapentity_core::{EntityId, Language, ModelIdentity};
use mapentity_fs::ScopedDir;
use tera::{Context, Tera};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::ExportError;

/// MIME type of OpenDocument text files.
pub const ODT_MIMETYPE: &str = "application/vnd.oasis.opendocument.text";
/// Archive path of the embedded map image.
pub const MAP_IMAGE_PATH: &str = "Pictures/map.png";

const MANIFEST_PATH: &str = "META-INF/manifest.xml";
const RENDERED_MEMBERS: [&str; 2] = ["content.xml", "styles.xml"];
const GENERIC_APP: &str = "mapentity";
const GENERIC_MODEL: &str = "entity";

/// Provider of the artefacts a document embeds.
pub trait DocumentSource: Send + Sync {
    /// Up-to-date PNG map of the row, if it was captured.
    fn map_image(&self, model: &ModelIdentity, pk: EntityId) -> Option<Vec<u8>>;

    /// Pre-rendered HTML attribute block of the row, if available.
    fn attributes_html(
        &self,
        model: &ModelIdentity,
        pk: EntityId,
        language: &Language,
    ) -> Option<String>;
}

/// [`DocumentSource`] holding artefacts in memory.
///
/// # Examples
/// ```
/// use mapentity_core::{EntityId, Language, ModelIdentity};
/// use mapentity_export::{DocumentSource, MemoryDocumentSource};
///
/// let trek = ModelIdentity::new("trek");
/// let source = MemoryDocumentSource::default()
///     .with_attributes(trek.clone(), EntityId(1), "<p>Easy</p>");
/// assert!(source.map_image(&trek, EntityId(1)).is_none());
/// assert!(source.attributes_html(&trek, EntityId(1), &Language::default()).is_some());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryDocumentSource {
    images: HashMap<(ModelIdentity, EntityId), Vec<u8>>,
    attributes: HashMap<(ModelIdentity, EntityId), String>,
}

impl MemoryDocumentSource {
    /// Add a captured map image.
    #[must_use]
    pub fn with_map_image(mut self, model: ModelIdentity, pk: EntityId, png: Vec<u8>) -> Self {
        self.images.insert((model, pk), png);
        self
    }

    /// Add an attribute block, valid for every language.
    #[must_use]
    pub fn with_attributes(
        mut self,
        model: ModelIdentity,
        pk: EntityId,
        html: impl Into<String>,
    ) -> Self {
        self.attributes.insert((model, pk), html.into());
        self
    }
}

impl DocumentSource for MemoryDocumentSource {
    fn map_image(&self, model: &ModelIdentity, pk: EntityId) -> Option<Vec<u8>> {
        self.images.get(&(model.clone(), pk)).cloned()
    }

    fn attributes_html(
        &self,
        model: &ModelIdentity,
        pk: EntityId,
        _language: &Language,
    ) -> Option<String> {
        self.attributes.get(&(model.clone(), pk)).cloned()
    }
}

/// [`DocumentSource`] reading artefacts from a media directory.
///
/// Map images live at `maps/{model}-{pk}.png`; attribute blocks at
/// `attributes/{model}-{pk}_{language}.html`, falling back to
/// `attributes/{model}-{pk}.html`.
#[derive(Debug)]
pub struct DirDocumentSource {
    dir: ScopedDir,
}

impl DirDocumentSource {
    /// Serve artefacts from `root`.
    ///
    /// # Errors
    /// Returns [`ExportError::Io`] when the directory cannot be opened.
    pub fn open(root: &Utf8Path) -> Result<Self, ExportError> {
        Ok(Self {
            dir: ScopedDir::open(root)?,
        })
    }

    fn read_optional(&self, relative: &Utf8Path) -> Option<Vec<u8>> {
        match self.dir.read(relative) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                debug!("document artefact {relative} unavailable: {err}");
                None
            }
        }
    }
}

impl DocumentSource for DirDocumentSource {
    fn map_image(&self, model: &ModelIdentity, pk: EntityId) -> Option<Vec<u8>> {
        self.read_optional(Utf8Path::new(&format!("maps/{model}-{pk}.png")))
    }

    fn attributes_html(
        &self,
        model: &ModelIdentity,
        pk: EntityId,
        language: &Language,
    ) -> Option<String> {
        [language.suffix(), String::new()]
            .iter()
            .find_map(|suffix| {
                self.read_optional(Utf8Path::new(&format!(
                    "attributes/{model}-{pk}{suffix}.html"
                )))
            })
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

/// Finds document templates, most specific first.
#[derive(Debug)]
pub struct TemplateLocator {
    dir: ScopedDir,
}

impl TemplateLocator {
    /// Look templates up under `root`.
    ///
    /// # Errors
    /// Returns [`ExportError::Io`] when the directory cannot be opened.
    pub fn open(root: &Utf8Path) -> Result<Self, ExportError> {
        Ok(Self {
            dir: ScopedDir::open(root)?,
        })
    }

    /// Names tried for a model, in order: `{app}/{model}{_lang}.odt` for
    /// each language, `{app}/{model}.odt`, then the same for the generic
    /// `mapentity/entity` template.
    #[must_use]
    pub fn candidates(app_label: &str, model: &ModelIdentity, languages: &[Language]) -> Vec<Utf8PathBuf> {
        let suffixes: Vec<String> = languages
            .iter()
            .map(Language::suffix)
            .chain(std::iter::once(String::new()))
            .collect();
        [(app_label, model.as_str()), (GENERIC_APP, GENERIC_MODEL)]
            .iter()
            .flat_map(|(app, name)| {
                suffixes
                    .iter()
                    .map(move |suffix| Utf8PathBuf::from(format!("{app}/{name}{suffix}.odt")))
            })
            .collect()
    }

    /// First existing template for the model.
    ///
    /// # Errors
    /// Returns [`ExportError::TemplateMissing`] naming the model's own
    /// language-neutral template when nothing matches.
    pub fn locate(
        &self,
        app_label: &str,
        model: &ModelIdentity,
        languages: &[Language],
    ) -> Result<Utf8PathBuf, ExportError> {
        for candidate in Self::candidates(app_label, model, languages) {
            if self.dir.is_file(&candidate)? {
                debug!("document template for {model}: {candidate}");
                return Ok(candidate);
            }
        }
        Err(ExportError::TemplateMissing {
            name: format!("{app_label}/{model}.odt"),
        })
    }

    /// Raw bytes of a located template.
    ///
    /// # Errors
    /// Returns [`ExportError::Io`] when the file cannot be read.
    pub fn read(&self, template: &Utf8Path) -> Result<Vec<u8>, ExportError> {
        Ok(self.dir.read(template)?)
    }
}

fn invalid_data(err: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn register_map_image(manifest: Vec<u8>) -> Result<Vec<u8>, ExportError> {
    let text = String::from_utf8(manifest).map_err(invalid_data)?;
    if text.contains(MAP_IMAGE_PATH) {
        return Ok(text.into_bytes());
    }
    let entry = format!(
        r#" <manifest:file-entry manifest:full-path="{MAP_IMAGE_PATH}" manifest:media-type="image/png"/>
</manifest:manifest>"#
    );
    Ok(text.replacen("</manifest:manifest>", &entry, 1).into_bytes())
}

fn read_member(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<Vec<u8>>, ExportError> {
    match archive.by_name(name) {
        Ok(mut member) => {
            let mut bytes = Vec::new();
            member.read_to_end(&mut bytes)?;
            Ok(Some(bytes))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Fill an `.odt` template and write the resulting document.
///
/// The `mimetype` member is written first and stored uncompressed, as
/// OpenDocument readers expect.
///
/// # Errors
/// Fails when the template is not a valid archive, a rendered member is
/// not valid UTF-8 or does not render, or the sink rejects a write.
pub fn render_odt<W: Write + ?Sized>(
    template: &[u8],
    context: &Context,
    map_image: &[u8],
    out: &mut W,
) -> Result<(), ExportError> {
    let mut source = ZipArchive::new(Cursor::new(template))?;
    let mut target = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mimetype = read_member(&mut source, "mimetype")?
        .unwrap_or_else(|| ODT_MIMETYPE.as_bytes().to_vec());
    target.start_file("mimetype", stored)?;
    target.write_all(&mimetype)?;

    for index in 0..source.len() {
        let mut member = source.by_index(index)?;
        let name = member.name().to_owned();
        if name == "mimetype" || name == MAP_IMAGE_PATH {
            continue;
        }
        if member.is_dir() {
            target.add_directory(name, deflated)?;
            continue;
        }
        let mut bytes = Vec::new();
        member.read_to_end(&mut bytes)?;
        let body = if RENDERED_MEMBERS.contains(&name.as_str()) {
            let text = String::from_utf8(bytes).map_err(invalid_data)?;
            Tera::one_off(&text, context, true)?.into_bytes()
        } else if name == MANIFEST_PATH {
            register_map_image(bytes)?
        } else {
            bytes
        };
        target.start_file(name, deflated)?;
        target.write_all(&body)?;
    }

    target.start_file(MAP_IMAGE_PATH, stored)?;
    target.write_all(map_image)?;
    let document = target.finish()?.into_inner();
    out.write_all(&document)?;
    Ok(())
}
