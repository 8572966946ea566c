//! The fixed set of operations a view can implement.
//!
//! Route naming, URL shapes and HTTP verbs are decided from the capability
//! tag alone, never from how a view is implemented.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// HTTP verbs a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Safe read.
    Get,
    /// Form submission.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

const READ_ONLY: &[HttpMethod] = &[HttpMethod::Get];
const READ_WRITE: &[HttpMethod] = &[HttpMethod::Get, HttpMethod::Post];

/// Kind of operation a view exposes for a model.
///
/// # Examples
/// ```
/// use mapentity_core::ViewCapability;
///
/// let capability: ViewCapability = "format_list".parse().unwrap();
/// assert_eq!(capability, ViewCapability::FormatList);
/// assert_eq!(capability.route_suffix(), "format_list");
/// assert_eq!(ViewCapability::Detail.url_pattern("trek"), "trek/{pk}/");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewCapability {
    /// Map layer (GeoJSON-like JSON of every row).
    Layer,
    /// HTML list page.
    List,
    /// Tabular JSON feeding list widgets.
    JsonList,
    /// File export of the list (CSV, Shapefile, GPX).
    FormatList,
    /// Single row.
    Detail,
    /// Printable document of a single row.
    Document,
    /// Rendered map image of a single row.
    MapImage,
    /// Creation form.
    Create,
    /// Edition form.
    Update,
    /// Deletion confirmation.
    Delete,
}

impl ViewCapability {
    /// Every capability, in canonical route order.
    pub const ALL: [Self; 10] = [
        Self::Layer,
        Self::List,
        Self::JsonList,
        Self::FormatList,
        Self::Detail,
        Self::Document,
        Self::MapImage,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    /// Suffix appended to the model name to form the route name.
    #[must_use]
    pub const fn route_suffix(self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::List => "list",
            Self::JsonList => "json_list",
            Self::FormatList => "format_list",
            Self::Detail => "detail",
            Self::Document => "document",
            Self::MapImage => "mapimage",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the capability addresses a single row (`{pk}` in its path).
    #[must_use]
    pub const fn is_single_row(self) -> bool {
        matches!(
            self,
            Self::Detail | Self::Document | Self::MapImage | Self::Update | Self::Delete
        )
    }

    /// HTTP verbs routed to the view.
    #[must_use]
    pub const fn http_methods(self) -> &'static [HttpMethod] {
        match self {
            Self::Create | Self::Update | Self::Delete => READ_WRITE,
            _ => READ_ONLY,
        }
    }

    /// Relative URL path for `model`, with a `{pk}` placeholder for
    /// single-row capabilities.
    #[must_use]
    pub fn url_pattern(self, model: &str) -> String {
        match self {
            Self::Layer => format!("api/{model}/{model}.geojson"),
            Self::List => format!("{model}/list/"),
            Self::JsonList => format!("api/{model}/{model}s.json"),
            Self::FormatList => format!("{model}/list/export/"),
            Self::Detail => format!("{model}/{{pk}}/"),
            Self::Document => format!("document/{model}-{{pk}}.odt"),
            Self::MapImage => format!("image/{model}-{{pk}}.png"),
            Self::Create => format!("{model}/add/"),
            Self::Update => format!("{model}/edit/{{pk}}/"),
            Self::Delete => format!("{model}/delete/{{pk}}/"),
        }
    }
}

impl fmt::Display for ViewCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route_suffix())
    }
}

impl FromStr for ViewCapability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|capability| capability.route_suffix() == wanted)
            .ok_or_else(|| format!("unknown view capability '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn suffixes_are_unique() {
        let mut suffixes: Vec<_> = ViewCapability::ALL
            .iter()
            .map(|capability| capability.route_suffix())
            .collect();
        suffixes.sort_unstable();
        suffixes.dedup();
        assert_eq!(suffixes.len(), ViewCapability::ALL.len());
    }

    #[rstest]
    #[case(ViewCapability::Create, READ_WRITE)]
    #[case(ViewCapability::Delete, READ_WRITE)]
    #[case(ViewCapability::Layer, READ_ONLY)]
    #[case(ViewCapability::Document, READ_ONLY)]
    fn verbs_follow_the_capability(
        #[case] capability: ViewCapability,
        #[case] expected: &[HttpMethod],
    ) {
        assert_eq!(capability.http_methods(), expected);
    }

    #[rstest]
    fn single_row_patterns_carry_a_pk_placeholder() {
        for capability in ViewCapability::ALL {
            let pattern = capability.url_pattern("poi");
            assert_eq!(pattern.contains("{pk}"), capability.is_single_row(), "{pattern}");
        }
    }

    #[rstest]
    #[case("json-list", ViewCapability::JsonList)]
    #[case(" Layer ", ViewCapability::Layer)]
    fn parsing_is_lenient_about_case_and_dashes(
        #[case] input: &str,
        #[case] expected: ViewCapability,
    ) {
        assert_eq!(input.parse::<ViewCapability>(), Ok(expected));
    }

    #[rstest]
    fn parsing_rejects_unknown() {
        let err = "export"
            .parse::<ViewCapability>()
            .expect_err("unknown capability");
        assert!(err.contains("unknown view capability"));
    }
}
