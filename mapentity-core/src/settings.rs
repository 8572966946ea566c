//! Deployment settings shared by the registry and the exporters.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::{Language, Srid};

/// Configuration of an entity deployment.
///
/// Every field has a default so partial configuration files deserialise.
///
/// # Examples
/// ```
/// use mapentity_core::{Language, Settings, Srid};
///
/// let settings: Settings = serde_json::from_str(r#"{"languages": ["fr", "en"]}"#).unwrap();
/// assert_eq!(settings.api_srid, Srid::WGS84);
/// let order: Vec<_> = settings
///     .language_priority(&Language::new("it"))
///     .into_iter()
///     .map(|language| language.to_string())
///     .collect();
/// assert_eq!(order, ["it", "fr", "en"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Site title rendered in documents.
    pub title: String,
    /// Configured languages, most preferred first.
    pub languages: Vec<Language>,
    /// Language used when a request does not name one.
    pub language_code: Language,
    /// Scratch directory for exports that need files on disk.
    pub temp_dir: Utf8PathBuf,
    /// Width and height of captured map images, in pixels.
    pub map_capture_size: u32,
    /// Name of the geometry field in rows and documents.
    pub geom_field_name: String,
    /// Storage SRID, used for shapefile output.
    pub srid: Srid,
    /// SRID of layer and detail responses.
    pub api_srid: Srid,
    /// Root of the document templates.
    pub template_dir: Utf8PathBuf,
    /// Directory of the disk layer cache, when enabled.
    pub cache_dir: Option<Utf8PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "MapEntity".to_owned(),
            languages: vec![Language::default()],
            language_code: Language::default(),
            temp_dir: default_temp_dir(),
            map_capture_size: 800,
            geom_field_name: "geom".to_owned(),
            srid: Srid::WGS84,
            api_srid: Srid::WGS84,
            template_dir: Utf8PathBuf::from("templates"),
            cache_dir: None,
        }
    }
}

impl Settings {
    /// Languages to try for a request: the requested one first, then the
    /// configured ones, without repetition.
    #[must_use]
    pub fn language_priority(&self, requested: &Language) -> Vec<Language> {
        let mut order = vec![requested.clone()];
        for language in &self.languages {
            if !order.contains(language) {
                order.push(language.clone());
            }
        }
        order
    }

    /// The requested language, or the default one.
    #[must_use]
    pub fn resolve_language(&self, requested: Option<&str>) -> Language {
        requested
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map_or_else(|| self.language_code.clone(), Language::new)
    }
}

fn default_temp_dir() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
