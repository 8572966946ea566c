//! Export requests: capability, output format and language.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use mapentity_core::{EntityId, Language, Settings, ViewCapability};

use crate::ExportError;

/// Output encodings selectable with the `format` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// GeoJSON or plain JSON.
    Json,
    /// Comma separated values.
    Csv,
    /// Zipped ESRI shapefile bundle.
    Shp,
    /// GPS exchange format 1.1.
    Gpx,
}

impl Format {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Shp => "shp",
            Self::Gpx => "gpx",
        }
    }

    /// Extension of the downloaded file.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Shp => "zip",
            other => other.as_str(),
        }
    }

    /// MIME type of the encoded output.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Shp => "application/zip",
            Self::Gpx => "application/gpx+xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "geojson" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "shp" => Ok(Self::Shp),
            "gpx" => Ok(Self::Gpx),
            _ => Err(s.to_owned()),
        }
    }
}

/// One export to perform.
///
/// # Examples
/// ```
/// use mapentity_core::{Settings, ViewCapability};
/// use mapentity_export::{ExportRequest, Format};
///
/// let settings = Settings::default();
/// let request =
///     ExportRequest::parse(ViewCapability::FormatList, Some("gpx"), Some("fr"), None, &settings)
///         .unwrap();
/// assert_eq!(request.format, Some(Format::Gpx));
/// assert_eq!(request.language.as_str(), "fr");
///
/// let err = ExportRequest::parse(ViewCapability::FormatList, Some("xml"), None, None, &settings)
///     .unwrap_err();
/// assert_eq!(err.status(), 400);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Kind of view being served.
    pub capability: ViewCapability,
    /// Requested encoding; each capability has its own default.
    pub format: Option<Format>,
    /// Language of labels and cached payloads.
    pub language: Language,
    /// Row addressed by single-row capabilities.
    pub pk: Option<EntityId>,
}

impl ExportRequest {
    /// A request using the capability's default format.
    #[must_use]
    pub fn new(capability: ViewCapability, language: Language) -> Self {
        Self {
            capability,
            format: None,
            language,
            pk: None,
        }
    }

    /// Select the output format.
    #[must_use]
    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Address a single row.
    #[must_use]
    pub const fn with_pk(mut self, pk: EntityId) -> Self {
        self.pk = Some(pk);
        self
    }

    /// Build a request from raw request parameters.
    ///
    /// An empty `format` counts as absent; missing languages fall back to
    /// [`Settings::language_code`].
    ///
    /// # Errors
    /// Returns [`ExportError::UnsupportedFormat`] for unknown format values.
    pub fn parse(
        capability: ViewCapability,
        format: Option<&str>,
        language: Option<&str>,
        pk: Option<u64>,
        settings: &Settings,
    ) -> Result<Self, ExportError> {
        let parsed = match format.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(value.parse::<Format>().map_err(|unknown| {
                log::warn!("unknown serialization format '{unknown}'");
                ExportError::UnsupportedFormat {
                    format: unknown,
                    capability,
                }
            })?),
            None => None,
        };
        Ok(Self {
            capability,
            format: parsed,
            language: settings.resolve_language(language),
            pk: pk.map(EntityId),
        })
    }
}

/// How the layer cache took part in an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// A fresh cached payload was returned.
    Hit,
    /// The payload was recomputed and stored.
    Miss,
    /// The model has no rows, so nothing was cached.
    Bypass,
    /// The capability is never cached.
    Uncached,
}

/// Metadata of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    /// MIME type of the bytes written.
    pub content_type: &'static str,
    /// Attachment file name, for downloads.
    pub filename: Option<String>,
    /// Cache participation.
    pub cache: CacheStatus,
}

/// Lowercase ASCII slug of `text`, words joined by `-`.
///
/// # Examples
/// ```
/// assert_eq!(mapentity_export::slugify("Sentier à thème"), "sentier-a-theme");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_ascii_lowercase();
    ascii
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Download name of a list export, e.g. `20240501-0830-trek-list.csv`.
#[must_use]
pub fn list_filename<Tz>(verbose_name: &str, format: Format, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}-{}-list.{}",
        at.format("%Y%m%d-%H%M"),
        slugify(verbose_name),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    #[case("csv", Format::Csv)]
    #[case("SHP", Format::Shp)]
    #[case("geojson", Format::Json)]
    fn formats_parse(#[case] value: &str, #[case] expected: Format) {
        assert_eq!(value.parse::<Format>(), Ok(expected));
    }

    #[rstest]
    #[case(Some("xml"))]
    #[case(Some("kml"))]
    fn unknown_formats_are_rejected(#[case] format: Option<&str>) {
        let result = ExportRequest::parse(
            ViewCapability::FormatList,
            format,
            None,
            None,
            &Settings::default(),
        );
        assert!(matches!(
            result,
            Err(ExportError::UnsupportedFormat { .. })
        ));
    }

    #[rstest]
    fn blank_format_means_default() {
        let request = ExportRequest::parse(
            ViewCapability::FormatList,
            Some(" "),
            None,
            Some(3),
            &Settings::default(),
        )
        .unwrap_or_else(|err| panic!("blank format: {err}"));
        assert_eq!(request.format, None);
        assert_eq!(request.pk, Some(EntityId(3)));
        assert_eq!(request.language, Language::new("en"));
    }

    #[rstest]
    #[case(Format::Shp, "20240501-0830-point-of-interest-list.zip")]
    #[case(Format::Gpx, "20240501-0830-point-of-interest-list.gpx")]
    fn list_filenames_follow_the_pattern(#[case] format: Format, #[case] expected: &str) {
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 8, 30, 12)
            .single()
            .unwrap_or_else(|| panic!("valid timestamp"));
        assert_eq!(list_filename("Point of interest", format, &at), expected);
    }
}
