//! Export layer of MapEntity.
//!
//! An [`ExportDispatcher`] turns an [`ExportRequest`] and a queryset into
//! bytes: cached GeoJSON layers, list JSON, CSV, GPX, zipped shapefiles,
//! single-row JSON, map images and OpenDocument sheets. Each encoder is
//! also usable on its own.

mod datatables;
mod dispatcher;
mod document;
mod error;
mod format;
mod gpx;
mod layer;
mod shape;
mod tabular;

pub use datatables::{DISPLAY_SUFFIX, write_json_list};
pub use dispatcher::ExportDispatcher;
pub use document::{
    DirDocumentSource, DocumentSource, MAP_IMAGE_PATH, MemoryDocumentSource, ODT_MIMETYPE,
    TemplateLocator, render_odt,
};
pub use error::{ErrorResponse, ExportError};
pub use format::{
    CacheStatus, ExportOutcome, ExportRequest, Format, list_filename, slugify,
};
pub use gpx::write_gpx;
pub use layer::{write_detail, write_layer};
pub use shape::{ShapefileLayer, projection_wkt, write_shapefile};
pub use tabular::{CSV_DISPLAY_SUFFIX, CsvOptions, write_csv};
