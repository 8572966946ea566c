//! Convention-based route tables.
//!
//! Route names follow `{namespace}:{model}_{suffix}` where the suffix comes
//! from the view's [`ViewCapability`]. Building a table is a pure function
//! of the model and its views.

use crate::{ConfigurationError, EntityId, HttpMethod, ModelIdentity, ViewCapability, ViewSpec};

/// Canonical route name of `capability` for `model` under `namespace`.
///
/// # Examples
/// ```
/// use mapentity_core::{ModelIdentity, ViewCapability, route_name};
///
/// let name = route_name("trekking", &ModelIdentity::new("trek"), ViewCapability::List);
/// assert_eq!(name, "trekking:trek_list");
/// ```
#[must_use]
pub fn route_name(namespace: &str, model: &ModelIdentity, capability: ViewCapability) -> String {
    format!("{namespace}:{model}_{}", capability.route_suffix())
}

/// One mounted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Relative path, with `{pk}` for single-row views.
    pub url_pattern: String,
    /// Operation served at the path.
    pub capability: ViewCapability,
    /// Unique name used for reverse lookups.
    pub route_name: String,
    /// Accepted HTTP verbs.
    pub methods: &'static [HttpMethod],
    /// View declaration backing the route.
    pub view: ViewSpec,
}

impl RouteEntry {
    /// Render the path, substituting `pk` for single-row routes.
    ///
    /// Returns `None` when a single-row route is reversed without a key.
    #[must_use]
    pub fn path(&self, pk: Option<EntityId>) -> Option<String> {
        if self.capability.is_single_row() {
            pk.map(|id| self.url_pattern.replace("{pk}", &id.to_string()))
        } else {
            Some(self.url_pattern.clone())
        }
    }
}

/// Ordered routes of one model, in view discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// A table with no routes.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Whether the table mounts nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Routes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }

    /// Route with the given name.
    #[must_use]
    pub fn get(&self, route_name: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.route_name == route_name)
    }

    /// Route serving `capability`.
    #[must_use]
    pub fn by_capability(&self, capability: ViewCapability) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.capability == capability)
    }

    /// Render the path of a named route.
    #[must_use]
    pub fn reverse(&self, route_name: &str, pk: Option<EntityId>) -> Option<String> {
        self.get(route_name).and_then(|entry| entry.path(pk))
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Build the route table of `model` from its views.
///
/// # Errors
/// Returns [`ConfigurationError::DuplicateCapability`] when two views claim
/// the same capability; the conflict is never resolved silently.
///
/// # Examples
/// ```
/// use mapentity_core::{ModelIdentity, ViewCapability, ViewSpec, build_route_table};
///
/// let trek = ModelIdentity::new("trek");
/// let views = [
///     ViewSpec::new("TrekList", trek.clone(), ViewCapability::List),
///     ViewSpec::new("TrekDetail", trek.clone(), ViewCapability::Detail),
/// ];
/// let table = build_route_table("trekking", &trek, &views).unwrap();
/// assert_eq!(table.len(), 2);
/// assert_eq!(
///     table.reverse("trekking:trek_detail", Some(mapentity_core::EntityId(3))),
///     Some("trek/3/".to_owned()),
/// );
/// ```
pub fn build_route_table<'a, I>(
    namespace: &str,
    model: &ModelIdentity,
    views: I,
) -> Result<RouteTable, ConfigurationError>
where
    I: IntoIterator<Item = &'a ViewSpec>,
{
    let mut entries: Vec<RouteEntry> = Vec::new();
    for view in views {
        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.capability == view.capability)
        {
            return Err(ConfigurationError::DuplicateCapability {
                model: model.clone(),
                capability: view.capability,
                first: existing.view.name.clone(),
                second: view.name.clone(),
            });
        }
        entries.push(RouteEntry {
            url_pattern: view.capability.url_pattern(model.as_str()),
            capability: view.capability,
            route_name: route_name(namespace, model, view.capability),
            methods: view.capability.http_methods(),
            view: view.clone(),
        });
    }
    Ok(RouteTable { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn poi() -> ModelIdentity {
        ModelIdentity::new("poi")
    }

    #[rstest]
    fn routes_keep_discovery_order(poi: ModelIdentity) {
        let views = [
            ViewSpec::new("PoiDelete", poi.clone(), ViewCapability::Delete),
            ViewSpec::new("PoiLayer", poi.clone(), ViewCapability::Layer),
            ViewSpec::new("PoiCreate", poi.clone(), ViewCapability::Create),
        ];
        let table = build_route_table("trekking", &poi, &views)
            .unwrap_or_else(|err| panic!("valid views: {err}"));
        let names: Vec<_> = table.iter().map(|entry| entry.route_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "trekking:poi_delete",
                "trekking:poi_layer",
                "trekking:poi_create"
            ]
        );
    }

    #[rstest]
    fn building_twice_is_deterministic(poi: ModelIdentity) {
        let views = [
            ViewSpec::new("PoiList", poi.clone(), ViewCapability::List),
            ViewSpec::new("PoiUpdate", poi.clone(), ViewCapability::Update),
        ];
        let first = build_route_table("trekking", &poi, &views);
        let second = build_route_table("trekking", &poi, &views);
        assert_eq!(first, second);
    }

    #[rstest]
    fn duplicate_capability_is_a_configuration_error(poi: ModelIdentity) {
        let views = [
            ViewSpec::new("PoiList", poi.clone(), ViewCapability::List),
            ViewSpec::new("PoiOtherList", poi.clone(), ViewCapability::List),
        ];
        let err = build_route_table("trekking", &poi, &views).expect_err("duplicate list views");
        assert_eq!(
            err,
            ConfigurationError::DuplicateCapability {
                model: poi,
                capability: ViewCapability::List,
                first: "PoiList".to_owned(),
                second: "PoiOtherList".to_owned(),
            }
        );
    }

    #[rstest]
    fn single_row_routes_need_a_key(poi: ModelIdentity) {
        let views = [ViewSpec::new("PoiDocument", poi.clone(), ViewCapability::Document)];
        let table = build_route_table("trekking", &poi, &views)
            .unwrap_or_else(|err| panic!("valid views: {err}"));
        assert_eq!(table.reverse("trekking:poi_document", None), None);
        assert_eq!(
            table.reverse("trekking:poi_document", Some(EntityId(9))),
            Some("document/poi-9.odt".to_owned())
        );
        assert_eq!(table.reverse("trekking:poi_list", None), None);
    }

    #[rstest]
    fn write_capabilities_accept_post(poi: ModelIdentity) {
        let views = [ViewSpec::new("PoiUpdate", poi.clone(), ViewCapability::Update)];
        let table = build_route_table("trekking", &poi, &views)
            .unwrap_or_else(|err| panic!("valid views: {err}"));
        let entry = table
            .by_capability(ViewCapability::Update)
            .unwrap_or_else(|| panic!("update route"));
        assert_eq!(entry.methods, [HttpMethod::Get, HttpMethod::Post]);
    }
}
