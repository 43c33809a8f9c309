//! Tagged markup encoding (`_F.xml`) and the catalog line.
//!
//! The block is a flat list of elements under `<latest_data_info>`. Every
//! child is optional on decode, in any order, but the block must carry
//! either `unix_time` or all six calendar fields, and must be closed.

use super::traits::{CodecError, RecordCodec};
use ldata_core::sentinel::{self, NONE, UNKNOWN};
use ldata_core::{CalendarTime, NotificationRecord};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::warn;

const CODEC_ID: &str = "tagged";

/// Root element of the tagged block.
pub const ROOT_TAG: &str = "latest_data_info";

/// Opening marker, used to locate the block inside queue payloads.
pub const OPEN_MARKER: &str = "<latest_data_info>";

/// Codec for the tagged markup file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaggedTextCodec;

impl TaggedTextCodec {
    /// Dense single-line form appended to the day catalog.
    ///
    /// No trailing newline; the catalog writer adds it.
    pub fn catalog_line(record: &NotificationRecord) -> String {
        let cal = record.latest_calendar();
        let mut line = String::new();
        let _ = write!(
            line,
            "<utime>{}</utime><time>{}</time><max_time>{}</max_time>",
            record.latest_time(),
            cal,
            record.max_time()
        );
        if record.is_forecast() {
            let _ = write!(line, "<lead_secs>{}</lead_secs>", record.forecast_lead_secs());
        }
        let _ = write!(
            line,
            "<rpath>{}</rpath>",
            escape(sentinel::field_or(record.resolved().rel_data_path, UNKNOWN))
        );
        if let Some(ext) = record.data_file_ext() {
            let _ = write!(line, "<ext>{}</ext>", escape(ext));
        }
        if let Some(data_type) = record.data_type() {
            let _ = write!(line, "<dtype>{}</dtype>", escape(data_type));
        }
        line
    }
}

impl RecordCodec for TaggedTextCodec {
    fn encode(&self, record: &NotificationRecord) -> Vec<u8> {
        let cal = record.latest_calendar();
        let mut out = String::with_capacity(512);
        let mut element = |name: &str, value: &str| {
            let _ = writeln!(out, "  <{name}>{}</{name}>", escape(value));
        };

        element("unix_time", &record.latest_time().to_string());
        element("year", &format!("{:04}", cal.year));
        element("month", &format!("{:02}", cal.month));
        element("day", &format!("{:02}", cal.day));
        element("hour", &format!("{:02}", cal.hour));
        element("min", &format!("{:02}", cal.min));
        element("sec", &format!("{:02}", cal.sec));
        element(
            "rel_data_path",
            sentinel::field_or(record.rel_data_path(), UNKNOWN),
        );
        element("file_ext", sentinel::field_or(record.data_file_ext(), NONE));
        element("data_type", sentinel::field_or(record.data_type(), UNKNOWN));
        element("user_info1", sentinel::field_or(record.user_info1(), NONE));
        element("user_info2", sentinel::field_or(record.user_info2(), NONE));
        element(
            "is_forecast",
            if record.is_forecast() { "true" } else { "false" },
        );
        element(
            "forecast_lead_secs",
            &record.forecast_lead_secs().to_string(),
        );
        if let Some(displaced) = record.displaced_dir_path() {
            element("displaced_dir_path", displaced);
        }
        element("writer", sentinel::field_or(record.writer(), UNKNOWN));
        element("max_time", &record.max_time().to_string());
        element("prev_mod_time", &record.prev_mod_time().to_string());

        format!("<{ROOT_TAG}>\n{out}</{ROOT_TAG}>\n").into_bytes()
    }

    fn decode(&self, data: &[u8]) -> Result<NotificationRecord, CodecError> {
        let fields = parse_block(data)?;
        let err = |detail: String| CodecError::decode(detail, CODEC_ID, data.len());
        let get = |name: &str| fields.get(name).map(String::as_str);

        let unix_time = get("unix_time").and_then(|s| s.parse::<i64>().ok());
        let calendar = calendar_from_fields(&fields);
        let latest_time = match (unix_time, calendar) {
            (Some(unix), Some(cal_unix)) => {
                if unix != cal_unix {
                    warn!(
                        target: "ldata::codec",
                        unix_time = unix,
                        calendar_time = cal_unix,
                        "unix_time disagrees with calendar fields, using calendar"
                    );
                }
                cal_unix
            }
            (Some(unix), None) => unix,
            (None, Some(cal_unix)) => cal_unix,
            (None, None) => return Err(err("no unix_time or calendar time".to_string())),
        };

        let mut record = NotificationRecord::new();
        record.set_latest_time(latest_time);

        if let Some(v) = get("rel_data_path").and_then(|v| sentinel::from_field(v, UNKNOWN)) {
            record.set_rel_data_path(v);
        }
        if let Some(v) = get("file_ext").and_then(|v| sentinel::from_field(v, NONE)) {
            record.set_data_file_ext(v);
        }
        if let Some(v) = get("data_type").and_then(|v| sentinel::from_field(v, UNKNOWN)) {
            record.set_data_type(v);
        }
        if let Some(v) = get("writer").and_then(|v| sentinel::from_field(v, UNKNOWN)) {
            record.set_writer(v);
        }
        if let Some(v) = get("user_info1").and_then(|v| sentinel::from_field(v, NONE)) {
            record.set_user_info1(v);
        }
        if let Some(v) = get("user_info2").and_then(|v| sentinel::from_field(v, NONE)) {
            record.set_user_info2(v);
        }
        if get("is_forecast") == Some("true") {
            let lead = get("forecast_lead_secs")
                .and_then(|s| s.parse::<i32>().ok())
                .unwrap_or(0);
            record.set_forecast(lead);
        }
        if let Some(v) = get("displaced_dir_path") {
            record.set_displaced_dir_path(v);
        }
        if let Some(max) = get("max_time").and_then(|s| s.parse::<i64>().ok()) {
            record.raise_max_time(max);
        }
        if let Some(prev) = get("prev_mod_time").and_then(|s| s.parse::<i64>().ok()) {
            record.set_prev_mod_time(prev);
        }
        Ok(record)
    }

    fn codec_id(&self) -> &str {
        CODEC_ID
    }
}

/// Collect the children of the root element. First occurrence wins.
fn parse_block(data: &[u8]) -> Result<HashMap<String, String>, CodecError> {
    let err = |detail: String| CodecError::decode(detail, CODEC_ID, data.len());

    // producers may append a NUL terminator
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = std::str::from_utf8(&data[..end]).map_err(|e| err(format!("not UTF-8: {}", e)))?;

    let mut reader = XmlReader::from_str(text);
    reader.trim_text(true);

    let mut fields = HashMap::new();
    let mut buf = Vec::new();
    let mut in_root = false;
    let mut closed = false;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == ROOT_TAG {
                    in_root = true;
                } else if in_root && !fields.contains_key(&name) {
                    fields.insert(name.clone(), String::new());
                    current = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if in_root {
                    fields.entry(name).or_default();
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = &current {
                    let value = t
                        .unescape()
                        .map_err(|e| err(format!("bad text in <{}>: {}", name, e)))?;
                    fields.insert(name.clone(), value.trim().to_string());
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == ROOT_TAG.as_bytes() {
                    closed = in_root;
                    break;
                }
                current = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(err(format!(
                    "markup error at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        buf.clear();
    }

    if !in_root {
        return Err(err(format!("no <{}> element", ROOT_TAG)));
    }
    if !closed {
        return Err(err(format!("missing </{}> marker", ROOT_TAG)));
    }
    Ok(fields)
}

fn calendar_from_fields(fields: &HashMap<String, String>) -> Option<i64> {
    let num = |name: &str| fields.get(name)?.parse::<u32>().ok();
    CalendarTime {
        year: fields.get("year")?.parse().ok()?,
        month: num("month")?,
        day: num("day")?,
        hour: num("hour")?,
        min: num("min")?,
        sec: num("sec")?,
    }
    .to_unix()
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn full_record() -> NotificationRecord {
        let mut r = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_rel_data_path("20200101/000000.dat")
            .with_data_file_ext("dat")
            .with_data_type("mdv")
            .with_writer("ingest")
            .with_user_info1("u1")
            .with_user_info2("u2")
            .with_forecast(3600)
            .with_displaced_dir_path("/mnt/elsewhere");
        r.raise_max_time(1577840000);
        r.set_prev_mod_time(1577836805);
        r
    }

    #[test]
    fn test_roundtrip_all_fields() {
        let record = full_record();
        let decoded = TaggedTextCodec
            .decode(&TaggedTextCodec.encode(&record))
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_encode_shape() {
        let record = NotificationRecord::new().with_latest_time(1577836800);
        let text = String::from_utf8(TaggedTextCodec.encode(&record)).unwrap();
        assert!(text.starts_with("<latest_data_info>\n"));
        assert!(text.ends_with("</latest_data_info>\n"));
        assert!(text.contains("  <year>2020</year>\n"));
        assert!(text.contains("  <month>01</month>\n"));
        assert!(text.contains("  <rel_data_path>unknown</rel_data_path>\n"));
        assert!(text.contains("  <file_ext>none</file_ext>\n"));
        assert!(text.contains("  <is_forecast>false</is_forecast>\n"));
        assert!(!text.contains("displaced_dir_path"));
    }

    #[test]
    fn test_sentinels_decode_to_none() {
        let record = NotificationRecord::new().with_latest_time(1577836800);
        let decoded = TaggedTextCodec
            .decode(&TaggedTextCodec.encode(&record))
            .unwrap();
        assert_eq!(decoded.rel_data_path(), None);
        assert_eq!(decoded.data_type(), None);
        assert_eq!(decoded.writer(), None);
        assert_eq!(decoded.user_info1(), None);
        assert_eq!(decoded.data_file_ext(), None);
    }

    #[test]
    fn test_decode_minimal_block() {
        let text = b"<latest_data_info><unix_time>1577836800</unix_time>\
            <rel_data_path>a/b.nc</rel_data_path></latest_data_info>";
        let decoded = TaggedTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 1577836800);
        assert_eq!(decoded.max_time(), 1577836800);
        assert_eq!(decoded.rel_data_path(), Some("a/b.nc"));
        assert!(!decoded.is_forecast());
    }

    #[test]
    fn test_decode_calendar_only() {
        let text = b"<latest_data_info><year>2020</year><month>1</month><day>1</day>\
            <hour>0</hour><min>0</min><sec>10</sec></latest_data_info>";
        let decoded = TaggedTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 1577836810);
    }

    #[test]
    fn test_calendar_wins_on_disagreement() {
        let text = b"<latest_data_info><unix_time>5</unix_time><year>2020</year>\
            <month>01</month><day>01</day><hour>00</hour><min>00</min><sec>00</sec>\
            </latest_data_info>";
        let decoded = TaggedTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 1577836800);
    }

    #[test]
    fn test_fields_in_any_order() {
        let text = b"<latest_data_info>\n  <writer>w</writer>\n  <is_forecast>true</is_forecast>\n\
            <forecast_lead_secs>60</forecast_lead_secs>\n  <unix_time>100</unix_time>\n\
            </latest_data_info>\n\0";
        let decoded = TaggedTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 100);
        assert_eq!(decoded.writer(), Some("w"));
        assert_eq!(decoded.forecast_lead_secs(), 60);
    }

    #[test]
    fn test_extreme_forecast_time_decodes() {
        let text = b"<latest_data_info><unix_time>9223372036854775807</unix_time>\
            <is_forecast>true</is_forecast><forecast_lead_secs>60</forecast_lead_secs>\
            </latest_data_info>";
        let record = TaggedTextCodec.decode(text).unwrap();
        assert_eq!(record.latest_time(), i64::MAX);
        assert_eq!(record.latest_valid_time(), i64::MAX);
        // re-encoding an out-of-range time must not panic either
        assert!(!TaggedTextCodec.encode(&record).is_empty());
    }

    #[test]
    fn test_missing_close_marker_fails() {
        let text = b"<latest_data_info><unix_time>100</unix_time>";
        let err = TaggedTextCodec.decode(text).unwrap_err();
        assert!(matches!(err, CodecError::DecodeError { .. }));
    }

    #[test]
    fn test_missing_time_fails() {
        let text = b"<latest_data_info><writer>w</writer></latest_data_info>";
        let err = TaggedTextCodec.decode(text).unwrap_err();
        assert!(err.to_string().contains("no unix_time"));
    }

    #[test]
    fn test_not_markup_fails() {
        assert!(TaggedTextCodec.decode(b"1577836800 2020 1 1 0 0 0\n").is_err());
        assert!(TaggedTextCodec.decode(b"").is_err());
    }

    #[test]
    fn test_special_characters_escaped() {
        let record = NotificationRecord::new()
            .with_latest_time(1)
            .with_user_info1("a<b & c>d");
        let bytes = TaggedTextCodec.encode(&record);
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("a&lt;b &amp; c&gt;d"));
        let decoded = TaggedTextCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.user_info1(), Some("a<b & c>d"));
    }

    #[test]
    fn test_catalog_line() {
        let record = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_rel_data_path("20200101/000000.nc")
            .with_data_file_ext("nc")
            .with_forecast(600);
        let line = TaggedTextCodec::catalog_line(&record);
        assert_eq!(
            line,
            "<utime>1577836800</utime><time>2020-01-01T00:00:00</time>\
             <max_time>1577836800</max_time><lead_secs>600</lead_secs>\
             <rpath>20200101/000000.nc</rpath><ext>nc</ext>"
        );
        assert!(!line.contains('\n'));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            latest in 0i64..4_000_000_000,
            bump in 0i64..1_000_000,
            rel in "[a-z0-9_/]{1,24}",
            writer in "[A-Za-z][A-Za-z0-9_ ]{0,15}",
            lead in proptest::option::of(0i32..864_000),
        ) {
            let mut record = NotificationRecord::new()
                .with_latest_time(latest)
                .with_rel_data_path(rel)
                .with_writer(writer.trim());
            record.raise_max_time(latest + bump);
            if let Some(lead) = lead {
                record.set_forecast(lead);
            }
            let decoded = TaggedTextCodec.decode(&TaggedTextCodec.encode(&record)).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
