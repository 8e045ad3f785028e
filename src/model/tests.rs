use super::*;
use crate::format::{FormatError, KvReader, KvWriter};
use crate::hashing::{Blake3Hasher, hash_content};
use chrono::{DateTime, TimeZone, Utc};
use std::io::Cursor;

fn snapshot(titles: &[&str]) -> ResultSnapshot {
    titles
        .iter()
        .map(|t| ResultEntry {
            title: t.to_string(),
            snippet: format!("about {t}"),
            url: format!("https://example.com/{t}"),
            size: "4k".to_string(),
            crowded: t.len() % 2 == 0,
        })
        .collect::<Vec<_>>()
        .into()
}

fn write<F>(f: F) -> Vec<u8>
where
    F: FnOnce(&mut KvWriter<Vec<u8>>) -> std::io::Result<()>,
{
    let mut writer = KvWriter::new(Vec::new());
    f(&mut writer).expect("write to vec");
    writer.into_inner()
}

#[test]
fn test_snapshot_body_roundtrip() {
    let original = snapshot(&["rust", "cargo", "crates"]);
    let bytes = write(|w| original.write_body(w));

    let mut reader = KvReader::new(Cursor::new(bytes));
    let decoded = ResultSnapshot::read_body(&mut reader).unwrap();

    assert_eq!(decoded, original);
    assert!(reader.is_eof().unwrap());
}

#[test]
fn test_snapshot_digest_is_order_sensitive() {
    let a = snapshot(&["one", "two"]);
    let b = snapshot(&["two", "one"]);

    assert_ne!(a.digest_with(&Blake3Hasher), b.digest_with(&Blake3Hasher));
    assert_eq!(
        a.digest_with(&Blake3Hasher),
        snapshot(&["one", "two"]).digest_with(&Blake3Hasher)
    );
}

#[test]
fn test_snapshot_digest_covers_canonical_bytes() {
    let s = snapshot(&["x"]);
    assert_eq!(s.digest_with(&Blake3Hasher), hash_content(&s.canonical_bytes()));
}

#[test]
fn test_empty_snapshot() {
    let empty = ResultSnapshot::default();
    assert_eq!(empty.canonical_bytes(), b"results=0\n");
    assert!(empty.is_empty());
}

#[test]
fn test_truncated_snapshot_is_rejected() {
    let bytes = b"results=2\ntitle=a\nsnippet=b\nurl=c\nsize=\ncrowded=false\n".to_vec();
    let mut reader = KvReader::new(Cursor::new(bytes));

    assert!(matches!(
        ResultSnapshot::read_body(&mut reader),
        Err(FormatError::UnexpectedEof { expected: "title" })
    ));
}

#[test]
fn test_formatter_roundtrip() {
    for profile in [
        ScoringProfile::frame("prod", "https://search/?q={query}"),
        ScoringProfile::snippets("exp", "https://exp/?q={query}", "//result"),
    ] {
        let bytes = write(|w| profile.write_to(w, "name"));
        let mut reader = KvReader::new(Cursor::new(bytes));
        assert_eq!(ScoringProfile::read_from(&mut reader, "name").unwrap(), profile);
    }
}

#[test]
fn test_formatter_unknown_type() {
    let bytes = b"name=p\nformatter=telepathy\nurl=x\n".to_vec();
    let mut reader = KvReader::new(Cursor::new(bytes));

    assert!(matches!(
        ScoringProfile::read_from(&mut reader, "name"),
        Err(FormatError::InvalidValue {
            key: "formatter",
            ..
        })
    ));
}

#[test]
fn test_formatter_saves_results() {
    assert!(!ScoringProfile::frame("a", "u").formatter.saves_results());
    assert!(ScoringProfile::snippets("a", "u", "s").formatter.saves_results());
    assert_eq!(ScoringProfile::frame("a", "u").formatter.url(), "u");
}

#[test]
fn test_judgment_names() {
    for j in [Judgment::FirstBetter, Judgment::SecondBetter, Judgment::Equal] {
        assert_eq!(j.as_str().parse::<Judgment>().unwrap(), j);
    }
    assert!("BETTER".parse::<Judgment>().is_err());
    assert_eq!(
        serde_json::to_string(&Judgment::SecondBetter).unwrap(),
        "\"SECOND_BETTER\""
    );
}

#[test]
fn test_handle_string_form() {
    let handle = ResultPairHandle::new(hash_content(b"a"), hash_content(b"b"));
    let text = handle.to_string();

    assert_eq!(text.len(), 128);
    assert_eq!(text.parse::<ResultPairHandle>().unwrap(), handle);
    assert!(text[..64].parse::<ResultPairHandle>().is_err());
}

fn record(handle: Option<ResultPairHandle>) -> JudgmentRecord {
    let mut record = JudgmentRecord::new(
        "best pizza\nnear me",
        Judgment::FirstBetter,
        ScoringProfile::snippets("baseline", "https://a/?q={query}", "li.result"),
        ScoringProfile::frame("candidate", "https://b/?q={query}"),
    )
    .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    record.handle = handle;
    record
}

#[test]
fn test_record_roundtrip_with_handle() {
    let original = record(Some(ResultPairHandle::new(
        hash_content(b"first"),
        hash_content(b"second"),
    )));
    let bytes = write(|w| original.write_to(w));

    let mut reader = KvReader::new(Cursor::new(bytes));
    assert_eq!(JudgmentRecord::read_from(&mut reader).unwrap(), original);
}

#[test]
fn test_record_roundtrip_without_handle() {
    let original = record(None);
    let bytes = write(|w| original.write_to(w));

    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(!text.contains("digest="));

    let mut reader = KvReader::new(Cursor::new(bytes));
    assert_eq!(JudgmentRecord::read_from(&mut reader).unwrap(), original);
}

#[test]
fn test_record_with_one_digest_is_inconsistent() {
    let original = record(None);
    let mut text = String::from_utf8(write(|w| original.write_to(w))).unwrap();
    let insert_at = text.find("profile=candidate").unwrap();
    text.insert_str(insert_at, &format!("digest={}\n", hash_content(b"x")));

    let mut reader = KvReader::new(Cursor::new(text.into_bytes()));
    assert!(matches!(
        JudgmentRecord::read_from(&mut reader),
        Err(FormatError::Inconsistent(_))
    ));
}

#[test]
fn test_record_timestamp_is_millisecond_precise() {
    let precise = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
    let r = record(None).with_timestamp(precise);

    assert_eq!(r.timestamp.timestamp_millis(), 1_700_000_000_123);
    assert_eq!(r.timestamp.timestamp_subsec_nanos(), 123_000_000);
}

#[test]
fn test_record_compares_either_order() {
    let r = record(None);
    assert!(r.compares("baseline", "candidate"));
    assert!(r.compares("candidate", "baseline"));
    assert!(!r.compares("baseline", "other"));
}

#[test]
fn test_query_list_normalizes() {
    let list = QueryList::from_unsorted(["dog", " cat ", "", "dog", "ant", "   "]);

    assert_eq!(list.as_slice(), &["ant", "cat", "dog"]);
    assert_eq!(list.position("cat"), Some(1));
    assert_eq!(list.position("cow"), None);
    assert_eq!(list.get(2), Some("dog"));
    assert_eq!(list.get(3), None);
}

#[test]
fn test_query_list_byte_order() {
    let list: QueryList = ["b", "B", "a", "é"].into_iter().collect();
    assert_eq!(list.as_slice(), &["B", "a", "b", "é"]);
}

#[test]
fn test_result_prefs_roundtrip() {
    let prefs = ResultPrefs {
        swap_sides: false,
        store_results: true,
        auto_submit: true,
        timeout_millis: 750,
        max_results: 20,
    };
    let bytes = write(|w| prefs.write_to(w));
    let mut reader = KvReader::new(Cursor::new(bytes));

    assert_eq!(ResultPrefs::read_from(&mut reader).unwrap(), prefs);
}
