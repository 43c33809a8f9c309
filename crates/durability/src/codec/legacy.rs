//! Fixed-line text encoding (`_F`).
//!
//! ```text
//! <unix> <year> <month> <day> <hour> <min> <sec>
//! <file ext>
//! <user_info1>
//! <user_info2>
//! <0|1>              forecast flag
//! <lead secs>        only when the flag is 1
//! ```
//!
//! A leading unix value of `-1` means the six calendar fields carry the
//! time. The user info lines hold the alias-resolved values so readers of
//! this format still see the writer name and data path.

use super::traits::{CodecError, RecordCodec};
use ldata_core::sentinel::{self, NONE};
use ldata_core::{CalendarTime, NotificationRecord};

const CODEC_ID: &str = "legacy";

/// Codec for the fixed-line text file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyTextCodec;

impl RecordCodec for LegacyTextCodec {
    fn encode(&self, record: &NotificationRecord) -> Vec<u8> {
        let cal = record.latest_calendar();
        let resolved = record.resolved();
        let mut out = format!(
            "{} {} {} {} {} {} {}\n",
            record.latest_time(),
            cal.year,
            cal.month,
            cal.day,
            cal.hour,
            cal.min,
            cal.sec
        );
        out.push_str(sentinel::field_or(record.data_file_ext(), NONE));
        out.push('\n');
        out.push_str(sentinel::field_or(resolved.user_info1, NONE));
        out.push('\n');
        out.push_str(sentinel::field_or(resolved.user_info2, NONE));
        out.push('\n');
        if record.is_forecast() {
            out.push_str(&format!("1\n{}\n", record.forecast_lead_secs()));
        } else {
            out.push_str("0\n");
        }
        out.into_bytes()
    }

    fn decode(&self, data: &[u8]) -> Result<NotificationRecord, CodecError> {
        let err = |detail: &str| CodecError::decode(detail, CODEC_ID, data.len());
        let text = std::str::from_utf8(data).map_err(|e| err(&format!("not UTF-8: {}", e)))?;
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

        let time_line = lines.next().ok_or_else(|| err("missing time line"))?;
        let latest_time = parse_time_line(time_line).map_err(|detail| err(&detail))?;

        let ext = lines.next().ok_or_else(|| err("missing file extension line"))?;
        let info1 = lines.next().ok_or_else(|| err("missing user info 1 line"))?;
        let info2 = lines.next().ok_or_else(|| err("missing user info 2 line"))?;
        let flag_line = lines.next().ok_or_else(|| err("missing forecast flag line"))?;
        let flag: i32 = first_token(flag_line)
            .ok_or_else(|| err(&format!("cannot decode forecast flag: {:?}", flag_line)))?;

        let mut record = NotificationRecord::new();
        record.set_latest_time(latest_time);
        if let Some(ext) = sentinel::from_field(ext, NONE) {
            record.set_data_file_ext(ext);
        }
        if let Some(info1) = sentinel::from_field(info1, NONE) {
            record.set_user_info1(info1);
        }
        if let Some(info2) = sentinel::from_field(info2, NONE) {
            record.set_user_info2(info2);
        }
        if flag != 0 {
            let lead_line = lines.next().ok_or_else(|| err("missing lead time line"))?;
            let lead: i32 = first_token(lead_line)
                .ok_or_else(|| err(&format!("cannot decode lead time: {:?}", lead_line)))?;
            record.set_forecast(lead);
        }
        Ok(record)
    }

    fn codec_id(&self) -> &str {
        CODEC_ID
    }
}

fn first_token<T: std::str::FromStr>(line: &str) -> Option<T> {
    line.split_whitespace().next()?.parse().ok()
}

fn parse_time_line(line: &str) -> Result<i64, String> {
    let mut tokens = line.split_whitespace();
    let unix: i64 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| format!("cannot decode unix time: {:?}", line))?;
    if unix != -1 {
        return Ok(unix);
    }

    let fields: Vec<i64> = tokens.take(6).filter_map(|t| t.parse().ok()).collect();
    if fields.len() != 6 {
        return Err(format!("cannot decode calendar time: {:?}", line));
    }
    let field = |i: usize| u32::try_from(fields[i]).map_err(|_| format!("bad calendar field: {:?}", line));
    CalendarTime {
        year: i32::try_from(fields[0]).map_err(|_| format!("bad year: {:?}", line))?,
        month: field(1)?,
        day: field(2)?,
        hour: field(3)?,
        min: field(4)?,
        sec: field(5)?,
    }
    .to_unix()
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let record = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_data_file_ext("dat")
            .with_writer("ingest")
            .with_rel_data_path("20200101/000000.dat");
        let text = String::from_utf8(LegacyTextCodec.encode(&record)).unwrap();
        assert_eq!(
            text,
            "1577836800 2020 1 1 0 0 0\ndat\ningest\n20200101/000000.dat\n0\n"
        );
    }

    #[test]
    fn test_encode_forecast_adds_lead_line() {
        let record = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_forecast(3600);
        let text = String::from_utf8(LegacyTextCodec.encode(&record)).unwrap();
        assert!(text.ends_with("none\nnone\n1\n3600\n"));
    }

    #[test]
    fn test_roundtrip_supported_fields() {
        let record = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_data_file_ext("mdv")
            .with_user_info1("ingest")
            .with_user_info2("20200101/000000.mdv")
            .with_forecast(1800);
        let decoded = LegacyTextCodec.decode(&LegacyTextCodec.encode(&record)).unwrap();
        assert_eq!(decoded.latest_time(), 1577836800);
        assert_eq!(decoded.max_time(), 1577836800);
        assert_eq!(decoded.data_file_ext(), Some("mdv"));
        assert_eq!(decoded.user_info1(), Some("ingest"));
        assert_eq!(decoded.user_info2(), Some("20200101/000000.mdv"));
        assert!(decoded.is_forecast());
        assert_eq!(decoded.forecast_lead_secs(), 1800);
        assert_eq!(decoded.data_type(), None);
        assert_eq!(decoded.writer(), None);
        assert_eq!(decoded.rel_data_path(), None);
    }

    #[test]
    fn test_decode_calendar_when_unix_is_minus_one() {
        let text = b"-1 2020 1 1 0 1 30\nnc\nnone\nnone\n0\n";
        let decoded = LegacyTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 1577836890);
        assert_eq!(decoded.user_info1(), None);
    }

    #[test]
    fn test_decode_tolerates_trailing_space_and_crlf() {
        let text = b"1577836800 2020 1 1 0 0 0 \r\nnc\r\nw\r\np\r\n0\r\n";
        let decoded = LegacyTextCodec.decode(text).unwrap();
        assert_eq!(decoded.latest_time(), 1577836800);
        assert_eq!(decoded.data_file_ext(), Some("nc"));
        assert_eq!(decoded.user_info2(), Some("p"));
    }

    #[test]
    fn test_decode_truncated_fails() {
        let err = LegacyTextCodec.decode(b"1577836800 2020 1 1 0 0 0\nnc\n").unwrap_err();
        assert!(err.to_string().contains("user info 2"));

        let err = LegacyTextCodec
            .decode(b"1577836800\nnc\na\nb\n1\n")
            .unwrap_err();
        assert!(err.to_string().contains("lead time"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(LegacyTextCodec.decode(b"hello world\n").is_err());
        assert!(LegacyTextCodec.decode(b"").is_err());
        assert!(LegacyTextCodec.decode(&[0xff, 0xfe, 0x00]).is_err());
    }
}
