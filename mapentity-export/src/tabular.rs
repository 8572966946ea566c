//! CSV encoder.

use std::io::Write;

use mapentity_core::{Column, Queryset};

use crate::ExportError;

/// Field suffix of CSV-specific display overrides.
pub const CSV_DISPLAY_SUFFIX: &str = "_csv_display";

/// Options of the CSV encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Transliterate every cell to ASCII.
    pub ensure_ascii: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { ensure_ascii: true }
    }
}

fn cell(text: String, options: CsvOptions) -> String {
    if options.ensure_ascii && !text.is_ascii() {
        deunicode::deunicode(&text)
    } else {
        text
    }
}

/// Write a header row, then one record per row, in `columns` order.
///
/// Values come from [`mapentity_core::Row::display_value`] with the
/// `_csv_display` override. Records are flushed through the `csv` writer's
/// buffer as they are produced.
///
/// # Errors
/// Fails when the sink rejects a write.
///
/// # Examples
/// ```
/// use mapentity_core::{Column, EntityId, Row};
/// use mapentity_export::{CsvOptions, write_csv};
///
/// let rows = vec![Row::new(EntityId(1)).with_field("name", "Lac Noir")];
/// let mut out = Vec::new();
/// write_csv(
///     Box::new(rows.into_iter()),
///     &[Column::new("id"), Column::labelled("name", "Name")],
///     CsvOptions::default(),
///     &mut out,
/// )
/// .unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "id,Name\n1,Lac Noir\n");
/// ```
pub fn write_csv<W: Write>(
    rows: Queryset<'_>,
    columns: &[Column],
    options: CsvOptions,
    out: W,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(
        columns
            .iter()
            .map(|column| cell(column.header().to_owned(), options)),
    )?;
    for row in rows {
        writer.write_record(columns.iter().map(|column| {
            cell(
                row.display_value(&column.field, CSV_DISPLAY_SUFFIX)
                    .to_string(),
                options,
            )
        }))?;
    }
    writer.flush()?;
    Ok(())
}
