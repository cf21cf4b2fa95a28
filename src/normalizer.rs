use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx, XlsxError};
use serde::Serialize;

use crate::coerce::{cell_to_string, format_date_part, format_time_part, to_bool, to_count, to_num};

/// Semantic fields the normalizer extracts from a worksheet
///
/// Each field carries an ordered list of accepted column-header aliases. The
/// alias table is the union of the header spellings observed across uploaded
/// campaign sheets, compared after [`normalize_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EventName,
    Title,
    Headline,
    BodyCopy,
    Subtitle,
    Date,
    Time,
    Seen,
    Unseen,
    Audience,
    SoldOut,
    Confirmed,
    AvailableSlots,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::EventName,
        Field::Title,
        Field::Headline,
        Field::BodyCopy,
        Field::Subtitle,
        Field::Date,
        Field::Time,
        Field::Seen,
        Field::Unseen,
        Field::Audience,
        Field::SoldOut,
        Field::Confirmed,
        Field::AvailableSlots,
    ];

    /// Accepted normalized-header aliases for this field
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::EventName => &["eventname", "event", "name", "notification", "label"],
            Field::Title => &["title"],
            Field::Headline => &["headline"],
            Field::BodyCopy => &["body", "bodytext", "body_text", "copy", "description"],
            Field::Subtitle => &["subtitle", "datetime", "sentat"],
            Field::Date => &["date", "eventdate"],
            Field::Time => &["time", "timeist", "time_ist", "eventtime"],
            Field::Seen => &["seen", "views", "opened"],
            Field::Unseen => &["unseen", "notseen", "unopened", "delivered"],
            Field::Audience => &["audience", "segment", "country", "region"],
            Field::SoldOut => &["soldout", "issoldout", "sold"],
            Field::Confirmed => &[
                "confirmedbooking",
                "confirmedbookings",
                "confirmed",
                "bookings",
                "booking",
            ],
            Field::AvailableSlots => &["availableslots", "slots", "availableslot"],
        }
    }
}

/// Normalize a raw column header for alias comparison
///
/// Trims surrounding whitespace, lowercases, and deletes internal whitespace
/// runs, so `"Event Name"`, `"eventname"` and `"Event   Name "` all compare
/// equal. Idempotent.
pub fn normalize_header(raw: &str) -> String {
    raw.to_lowercase().split_whitespace().collect()
}

/// Field-to-column-index table, resolved once per worksheet
///
/// For each field, the first column (in column order) whose normalized header
/// matches any of the field's aliases wins. If two raw headers normalize to
/// the same alias the leftmost column is used; the choice is deterministic
/// but otherwise carries no business meaning.
#[derive(Debug)]
pub struct ColumnMap {
    cols: [Option<usize>; Field::ALL.len()],
}

impl ColumnMap {
    pub fn resolve(header_row: &[Data]) -> Self {
        let normalized: Vec<String> = header_row
            .iter()
            .map(|cell| normalize_header(&cell_to_string(cell)))
            .collect();

        let mut cols = [None; Field::ALL.len()];
        for field in Field::ALL {
            cols[field as usize] = normalized
                .iter()
                .position(|header| field.aliases().contains(&header.as_str()));
        }
        ColumnMap { cols }
    }

    /// Resolved column index for a field, if any header matched
    pub fn get(&self, field: Field) -> Option<usize> {
        self.cols[field as usize]
    }
}

/// One chart-ready row extracted from a worksheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    /// Event/notification name, used as display label and chart-axis label
    pub body: String,
    /// Combined date-time in the fixed textual form `YYYY-MM-DD HH:MM:SS`
    pub subtitle: String,
    pub seen: u64,
    pub unseen: u64,
    /// Free-text segment/region label
    pub audience: String,
    /// `None` when the sheet has no sold-out column at all
    #[serde(rename = "soldOut", skip_serializing_if = "Option::is_none")]
    pub sold_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<u64>,
    #[serde(rename = "availableSlots", skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<u64>,
}

/// Rows and index-aligned marketing copy extracted from a single worksheet
///
/// The three text sequences always have exactly `rows.len()` entries: rows
/// from sheets without a title/headline/body column get empty-string
/// placeholders, so concatenating sheets can never desynchronize the
/// sequences.
#[derive(Debug, Default)]
pub struct SheetRows {
    pub rows: Vec<NormalizedRow>,
    pub titles: Vec<String>,
    pub headlines: Vec<String>,
    pub bodies: Vec<String>,
}

/// Workbook-level chart payload, serialized with the legacy uppercase keys
/// the dashboard consumes
#[derive(Debug, Default, Serialize)]
pub struct ChartData {
    #[serde(rename = "ROWS")]
    pub rows: Vec<NormalizedRow>,
    #[serde(rename = "TITLES")]
    pub titles: Vec<String>,
    #[serde(rename = "HEADLINES")]
    pub headlines: Vec<String>,
    #[serde(rename = "BODIES")]
    pub bodies: Vec<String>,
    #[serde(rename = "LINE_LABELS")]
    pub line_labels: Vec<String>,
    #[serde(rename = "LINE_SEEN")]
    pub line_seen: Vec<u64>,
}

/// Extract chart rows from one worksheet
///
/// The first row is the header row; every following row is looked up through
/// the resolved [`ColumnMap`]. Rows where every tracked field is empty or
/// zero are dropped, together with their marketing-copy entries, so sparse
/// spreadsheets with trailing blank rows produce no filler.
pub fn rows_from_sheet(range: &Range<Data>) -> SheetRows {
    let mut out = SheetRows::default();
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return out;
    };
    let map = ColumnMap::resolve(header_row);

    for row in rows {
        let cell = |field: Field| map.get(field).and_then(|i| row.get(i));

        let body = cell(Field::EventName).map(cell_to_string).unwrap_or_default();

        // Prefer a direct subtitle column; otherwise assemble one from the
        // separate date and time columns.
        let mut subtitle = cell(Field::Subtitle).map(cell_to_string).unwrap_or_default();
        if subtitle.is_empty() {
            let date_part = cell(Field::Date).map(format_date_part).unwrap_or_default();
            let time_part = cell(Field::Time).map(format_time_part).unwrap_or_default();
            subtitle = if !date_part.is_empty() && !time_part.is_empty() {
                format!("{date_part} {time_part}")
            } else {
                format!("{date_part}{time_part}").trim().to_string()
            };
        }

        let seen = cell(Field::Seen).map(to_num).unwrap_or(0.0);
        let unseen = cell(Field::Unseen).map(to_num).unwrap_or(0.0);
        let audience = cell(Field::Audience).map(cell_to_string).unwrap_or_default();

        // Sparse-data filter: skip rows where nothing tracked is present.
        if body.is_empty()
            && subtitle.is_empty()
            && audience.is_empty()
            && seen == 0.0
            && unseen == 0.0
        {
            continue;
        }

        // Optional fields stay None when the column is unresolved, so the
        // payload distinguishes "not tracked" from "tracked and zero".
        let sold_out = cell(Field::SoldOut).map(to_bool);
        let confirmed = cell(Field::Confirmed).map(to_count);
        let available_slots = cell(Field::AvailableSlots).map(to_count);

        out.titles
            .push(cell(Field::Title).map(cell_to_string).unwrap_or_default());
        out.headlines
            .push(cell(Field::Headline).map(cell_to_string).unwrap_or_default());
        out.bodies
            .push(cell(Field::BodyCopy).map(cell_to_string).unwrap_or_default());
        out.rows.push(NormalizedRow {
            body,
            subtitle,
            seen: seen as u64,
            unseen: unseen as u64,
            audience,
            sold_out,
            confirmed,
            available_slots,
        });
    }

    out
}

/// Run the normalizer over every sheet of an open workbook
///
/// Sheets are processed independently and concatenated in worksheet order,
/// then in within-sheet row order. `LINE_LABELS`/`LINE_SEEN` are projections
/// of the concatenated rows, recomputed on every call.
pub fn chart_data_from_workbook<RS>(workbook: &mut Xlsx<RS>) -> ChartData
where
    RS: std::io::Read + std::io::Seek,
{
    let mut data = ChartData::default();
    for name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(err) => {
                log::warn!("Skipping unreadable sheet {name:?}: {err}");
                continue;
            }
        };
        let sheet = rows_from_sheet(&range);
        data.rows.extend(sheet.rows);
        data.titles.extend(sheet.titles);
        data.headlines.extend(sheet.headlines);
        data.bodies.extend(sheet.bodies);
    }

    data.line_labels = data.rows.iter().map(|row| row.body.clone()).collect();
    data.line_seen = data.rows.iter().map(|row| row.seen).collect();
    data
}

/// Parse workbook bytes and normalize every sheet
///
/// The only failure mode is an unparseable workbook; malformed cell content
/// never errors (every coercion degrades to a safe default).
pub fn chart_data_from_bytes(bytes: &[u8]) -> Result<ChartData, XlsxError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    Ok(chart_data_from_workbook(&mut workbook))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn sheet(cells: &[&[Data]]) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|row| row.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    #[test]
    fn test_normalize_header_is_idempotent() {
        for raw in ["Event Name", "  SEEN ", "Time (IST)", "availableslots", ""] {
            let once = normalize_header(raw);
            assert_eq!(normalize_header(&once), once);
        }
    }

    #[test]
    fn test_normalize_header_collapses_case_and_whitespace() {
        assert_eq!(normalize_header("Event Name"), "eventname");
        assert_eq!(normalize_header("Event   Name "), "eventname");
        assert_eq!(normalize_header("eventname"), "eventname");
        assert_eq!(normalize_header("\tSeen\n"), "seen");
    }

    #[test]
    fn test_resolve_matches_alias_variants() {
        let map = ColumnMap::resolve(&[s("Notification"), s("VIEWS"), s("Not Seen")]);
        assert_eq!(map.get(Field::EventName), Some(0));
        assert_eq!(map.get(Field::Seen), Some(1));
        assert_eq!(map.get(Field::Unseen), Some(2));
        assert_eq!(map.get(Field::Audience), None);
    }

    #[test]
    fn test_resolve_first_column_wins() {
        // Both headers normalize to event-name aliases; the leftmost wins.
        let map = ColumnMap::resolve(&[s("Name"), s("Event Name")]);
        assert_eq!(map.get(Field::EventName), Some(0));
    }

    #[test]
    fn test_extract_basic_row() {
        let range = sheet(&[
            &[s("Event Name"), s("Date"), s("Time"), s("Seen"), s("Unseen")],
            &[
                s("Launch"),
                s("2024-03-01"),
                Data::Float(845.0 / 1440.0),
                s("10"),
                s("2"),
            ],
        ]);
        let out = rows_from_sheet(&range);
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.body, "Launch");
        assert_eq!(row.subtitle, "2024-03-01 14:05:00");
        assert_eq!(row.seen, 10);
        assert_eq!(row.unseen, 2);
        assert_eq!(row.sold_out, None);
        assert_eq!(row.confirmed, None);
    }

    #[test]
    fn test_direct_subtitle_column_is_not_reformatted() {
        let range = sheet(&[
            &[s("Name"), s("Sent At"), s("Date")],
            &[s("Drop"), s("yesterday 5pm"), Data::Float(45352.0)],
        ]);
        let out = rows_from_sheet(&range);
        assert_eq!(out.rows[0].subtitle, "yesterday 5pm");
    }

    #[test]
    fn test_subtitle_single_part_used_alone() {
        let range = sheet(&[
            &[s("Name"), s("Date"), s("Time")],
            &[s("A"), s("2024-05-01"), Data::Empty],
            &[s("B"), Data::Empty, s("9:15")],
        ]);
        let out = rows_from_sheet(&range);
        assert_eq!(out.rows[0].subtitle, "2024-05-01");
        assert_eq!(out.rows[1].subtitle, "9:15:00");
    }

    #[test]
    fn test_blank_rows_dropped_with_copy_alignment() {
        let range = sheet(&[
            &[s("Event Name"), s("Seen"), s("Title")],
            &[s("First"), s("3"), s("title one")],
            &[Data::Empty, Data::Empty, Data::Empty],
            &[s(""), s("0"), s("orphan title")],
            &[s("Second"), s("0"), s("title two")],
        ]);
        let out = rows_from_sheet(&range);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.titles, vec!["title one", "title two"]);
        assert_eq!(out.headlines, vec!["", ""]);
        assert_eq!(out.bodies, vec!["", ""]);
    }

    #[test]
    fn test_unrecognized_headers_yield_no_rows() {
        let range = sheet(&[
            &[s("Alpha"), s("Beta"), s("Gamma")],
            &[s("x"), s("y"), s("z")],
            &[s("1"), s("2"), s("3")],
        ]);
        let out = rows_from_sheet(&range);
        assert!(out.rows.is_empty());
        assert!(out.titles.is_empty());
    }

    #[test]
    fn test_optional_fields_tracked_vs_zero() {
        let range = sheet(&[
            &[s("Name"), s("Sold Out"), s("Confirmed Bookings"), s("Slots")],
            &[s("Gala"), s("SOLD"), s("0"), s("12")],
        ]);
        let out = rows_from_sheet(&range);
        let row = &out.rows[0];
        assert_eq!(row.sold_out, Some(true));
        assert_eq!(row.confirmed, Some(0));
        assert_eq!(row.available_slots, Some(12));
    }

    #[test]
    fn test_numeric_event_name_counts_as_present() {
        let range = sheet(&[&[s("Name"), s("Seen")], &[Data::Float(0.0), s("")]]);
        let out = rows_from_sheet(&range);
        // "0" is a non-empty label even though the metrics are zero
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].body, "0");
    }

    #[test]
    fn test_header_only_sheet_is_empty() {
        let range = sheet(&[&[s("Event Name"), s("Seen")]]);
        let out = rows_from_sheet(&range);
        assert!(out.rows.is_empty());
    }

    #[test]
    fn test_multi_sheet_concatenation_keeps_alignment() {
        // First sheet has a Title column, second does not; the concatenated
        // TITLES must still line up with ROWS.
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let first = workbook.add_worksheet();
        first.write_string(0, 0, "Event Name").unwrap();
        first.write_string(0, 1, "Seen").unwrap();
        first.write_string(0, 2, "Title").unwrap();
        first.write_string(1, 0, "Alpha").unwrap();
        first.write_number(1, 1, 4).unwrap();
        first.write_string(1, 2, "March promo").unwrap();

        let second = workbook.add_worksheet();
        second.write_string(0, 0, "Event Name").unwrap();
        second.write_string(0, 1, "Seen").unwrap();
        second.write_string(1, 0, "Beta").unwrap();
        second.write_number(1, 1, 9).unwrap();
        second.write_string(2, 0, "Gamma").unwrap();
        second.write_number(2, 1, 1).unwrap();

        let bytes = workbook.save_to_buffer().unwrap();
        let data = chart_data_from_bytes(&bytes).unwrap();

        assert_eq!(data.rows.len(), 3);
        assert_eq!(data.titles, vec!["March promo", "", ""]);
        assert_eq!(data.headlines.len(), 3);
        assert_eq!(data.bodies.len(), 3);
        assert_eq!(data.line_labels, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(data.line_seen, vec![4, 9, 1]);
    }

    #[test]
    fn test_line_projections_match_rows() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let ws = workbook.add_worksheet();
        ws.write_string(0, 0, "Name").unwrap();
        ws.write_string(0, 1, "Seen").unwrap();
        for (i, (name, seen)) in [("a", 1.0), ("b", 0.0), ("c", 7.0)].iter().enumerate() {
            ws.write_string(i as u32 + 1, 0, *name).unwrap();
            ws.write_number(i as u32 + 1, 1, *seen).unwrap();
        }
        let data = chart_data_from_bytes(&workbook.save_to_buffer().unwrap()).unwrap();
        assert_eq!(data.line_labels.len(), data.rows.len());
        assert_eq!(data.line_seen.len(), data.rows.len());
    }

    #[test]
    fn test_malformed_bytes_error() {
        assert!(chart_data_from_bytes(b"this is not a zip archive").is_err());
    }

    #[test]
    fn test_row_serialization_shape() {
        let range = sheet(&[
            &[s("Name"), s("Seen"), s("Sold Out")],
            &[s("Gig"), s("5"), s("no")],
        ]);
        let out = rows_from_sheet(&range);
        let json = serde_json::to_value(&out.rows[0]).unwrap();
        assert_eq!(json["body"], "Gig");
        assert_eq!(json["seen"], 5);
        assert_eq!(json["soldOut"], false);
        // Unresolved optional columns are omitted entirely
        assert!(json.get("confirmed").is_none());
        assert!(json.get("availableSlots").is_none());
    }
}
