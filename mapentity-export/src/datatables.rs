//! Tabular JSON feeding list widgets.

use std::io::Write;

use mapentity_core::{Column, Queryset};

use crate::ExportError;

/// Field suffix of list display overrides.
pub const DISPLAY_SUFFIX: &str = "_display";

/// Write `{"aaData": [...], "map_obj_pk": [...], "iTotalRecords": n,
/// "iTotalDisplayRecords": n}`.
///
/// `aaData` holds one array per row in `columns` order; cells use the
/// `_display` override when present. Rows are streamed, the totals are
/// written once every row has been seen.
///
/// # Errors
/// Fails when the sink rejects a write.
pub fn write_json_list<W: Write + ?Sized>(
    rows: Queryset<'_>,
    columns: &[Column],
    out: &mut W,
) -> Result<(), ExportError> {
    let mut pks = Vec::new();
    out.write_all(br#"{"aaData":["#)?;
    for row in rows {
        if !pks.is_empty() {
            out.write_all(b",")?;
        }
        let cells: Vec<_> = columns
            .iter()
            .map(|column| row.display_value(&column.field, DISPLAY_SUFFIX))
            .collect();
        serde_json::to_writer(&mut *out, &cells)?;
        pks.push(row.pk);
    }
    out.write_all(br#"],"map_obj_pk":"#)?;
    serde_json::to_writer(&mut *out, &pks)?;
    write!(
        out,
        r#","iTotalRecords":{total},"iTotalDisplayRecords":{total}}}"#,
        total = pks.len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapentity_core::{EntityId, Row};
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    fn rows_become_arrays_in_column_order() {
        let rows = vec![
            Row::new(EntityId(4))
                .with_field("name", "Pic")
                .with_field("name_display", "<a href=\"/poi/4/\">Pic</a>"),
            Row::new(EntityId(9)).with_field("name", "Lac"),
        ];
        let mut out = Vec::new();
        write_json_list(
            Box::new(rows.into_iter()),
            &[Column::new("id"), Column::new("name")],
            &mut out,
        )
        .unwrap_or_else(|err| panic!("json list: {err}"));
        let body: Value =
            serde_json::from_slice(&out).unwrap_or_else(|err| panic!("valid JSON: {err}"));
        assert_eq!(
            body,
            json!({
                "aaData": [[4, "<a href=\"/poi/4/\">Pic</a>"], [9, "Lac"]],
                "map_obj_pk": [4, 9],
                "iTotalRecords": 2,
                "iTotalDisplayRecords": 2,
            })
        );
    }

    #[rstest]
    fn empty_querysets_are_valid() {
        let mut out = Vec::new();
        write_json_list(Box::new(std::iter::empty()), &[Column::new("id")], &mut out)
            .unwrap_or_else(|err| panic!("json list: {err}"));
        let body: Value =
            serde_json::from_slice(&out).unwrap_or_else(|err| panic!("valid JSON: {err}"));
        assert_eq!(body["iTotalRecords"], 0);
    }
}
