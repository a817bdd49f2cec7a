mod common;

use common::{block, block_with_checksum, bmv_block, mppt_block};
use rand::Rng;
use test_case::test_case;
use vedirect::text::{
    DecodeError, DecodeErrorKind, Decoder, DecoderConfig, Event, FramingError, Record, CR, LF,
    TAB,
};

fn decode(dat: &[u8]) -> Vec<Event> {
    Decoder::new().feed(dat).collect()
}

fn records(events: &[Event]) -> Vec<&Record> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Record(r) => Some(r),
            Event::Error(_) => None,
        })
        .collect()
}

fn error_kinds(events: &[Event]) -> Vec<DecodeErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Error(err) => Some(err.kind()),
            Event::Record(_) => None,
        })
        .collect()
}

#[test]
fn single_block_scenario() {
    let dat = block(&[("V", "12353"), ("I", "100")]);
    let events = decode(&dat);

    assert_eq!(events.len(), 1, "{events:?}");
    let record = records(&events)[0];
    assert_eq!(record.labels().collect::<Vec<_>>(), ["V", "I"]);
    assert_eq!(record.get("V"), Some(&b"12353"[..]));
    assert_eq!(record.get("I"), Some(&b"100"[..]));
    assert_eq!(record.get("Checksum"), None);
    assert_eq!(record.checksum(), *dat.last().unwrap());
}

#[test]
fn checksum_plus_one_scenario() {
    let mut dat = block(&[("V", "12353"), ("I", "100")]);
    let last = dat.len() - 1;
    dat[last] = dat[last].wrapping_add(1);

    let events = decode(&dat);
    assert_eq!(error_kinds(&events), [DecodeErrorKind::ChecksumMismatch]);
    assert!(records(&events).is_empty());
}

#[test]
fn device_blocks_keep_field_order() {
    let mut dat = mppt_block();
    dat.extend(bmv_block());
    let events = decode(&dat);

    let records = records(&events);
    assert_eq!(records.len(), 2, "{events:?}");
    assert_eq!(records[0].len(), 18);
    assert_eq!(records[0].get_str("SER#"), Some("HQ2132QY2KR"));
    assert_eq!(records[0].labels().last(), Some("HSDS"));
    assert_eq!(records[1].labels().next(), Some("PID"));
    assert_eq!(records[1].get_str("SOC"), Some("1000"));
}

#[test]
fn decoder_attached_mid_block_syncs_on_next_field() {
    let dat = mppt_block();
    // starting inside the first value; the block is incomplete and fails
    let mut stream = dat[5..].to_vec();
    stream.extend(bmv_block());

    let events = decode(&stream);
    assert_eq!(error_kinds(&events), [DecodeErrorKind::ChecksumMismatch]);
    assert_eq!(records(&events).len(), 1);
}

#[test]
fn chunking_does_not_change_events() {
    let mut dat = Vec::new();
    for _ in 0..3 {
        dat.extend(mppt_block());
        dat.extend(b"\r\nGARBAGELABEL\tx");
        dat.extend(bmv_block());
    }
    let mut corrupt = bmv_block();
    corrupt[10] ^= 0x40;
    dat.extend(corrupt);

    let whole = decode(&dat);

    let mut decoder = Decoder::new();
    let mut single = Vec::new();
    for b in &dat {
        single.extend(decoder.feed(&[*b]));
    }
    assert_eq!(whole, single);

    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let mut decoder = Decoder::new();
        let mut chunked = Vec::new();
        let mut rest = &dat[..];
        while !rest.is_empty() {
            let n = rng.gen_range(1..=rest.len().min(64));
            let (chunk, tail) = rest.split_at(n);
            chunked.extend(decoder.feed(chunk));
            rest = tail;
        }
        assert_eq!(whole, chunked);
    }
}

#[test_case(0 ; "bit 0")]
#[test_case(1 ; "bit 1")]
#[test_case(2 ; "bit 2")]
#[test_case(3 ; "bit 3")]
#[test_case(4 ; "bit 4")]
#[test_case(5 ; "bit 5")]
#[test_case(6 ; "bit 6")]
#[test_case(7 ; "bit 7")]
fn checksum_bit_flip_is_mismatch(bit: u8) {
    let mut dat = block(&[("V", "12353"), ("I", "100")]);
    let last = dat.len() - 1;
    dat[last] ^= 1 << bit;
    dat.extend(block(&[("V", "12400")]));

    let events = decode(&dat);
    assert_eq!(error_kinds(&events), [DecodeErrorKind::ChecksumMismatch]);
    let records = records(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("V"), Some("12400"));
    assert_eq!(records[0].get("I"), None);
}

#[test_case(CR ; "carriage return")]
#[test_case(LF ; "line feed")]
#[test_case(TAB ; "tab")]
#[test_case(0x00 ; "nul")]
#[test_case(0xff ; "high byte")]
fn checksum_byte_may_look_like_a_delimiter(checksum: u8) {
    let mut dat = block_with_checksum(checksum);
    dat.extend(block_with_checksum(checksum));

    let events = decode(&dat);
    assert_eq!(records(&events).len(), 2, "{events:?}");
    assert!(error_kinds(&events).is_empty());
}

#[test]
fn long_label_is_one_framing_error() {
    let mut dat = block(&[("V", "1"), ("WAYTOOLONGLABEL", "5"), ("I", "2")]);
    dat.extend(block(&[("V", "2")]));

    let events = decode(&dat);
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(
        &events[0],
        Event::Error(DecodeError::Framing {
            reason: FramingError::LabelTooLong { max: 9 },
            fields: 1,
            ..
        })
    ));
    let records = records(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("V"), Some("2"));
}

#[test]
fn corrupted_checksum_label_does_not_hide_next_block() {
    // tab and checksum byte of the first block garbled into the label
    let mut dat = block(&[("V", "12353")]);
    let len = dat.len();
    dat[len - 2..].copy_from_slice(b"XY");

    let mut bad_checksum = block(&[("V", "1"), ("I", "2")]);
    let last = bad_checksum.len() - 1;
    bad_checksum[last] ^= 0x01;
    dat.extend(bad_checksum);
    dat.extend(block(&[("V", "3")]));

    let mut decoder = Decoder::new();
    let events: Vec<Event> = decoder.feed(&dat).collect();
    assert_eq!(
        error_kinds(&events),
        [DecodeErrorKind::Framing, DecodeErrorKind::ChecksumMismatch],
        "{events:?}"
    );
    assert!(matches!(
        &events[0],
        Event::Error(DecodeError::Framing {
            reason: FramingError::LabelTooLong { max: 9 },
            ..
        })
    ));
    let records = records(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("V"), Some("3"));
    assert_eq!(decoder.stats().partial_blocks, 0);
}

#[test]
fn label_with_space_is_accepted() {
    let events = decode(&block(&[("A B", "1")]));
    assert_eq!(records(&events)[0].get_str("A B"), Some("1"));
}

#[test]
fn long_value_is_framing_error() {
    let long = "9".repeat(40);
    let mut dat = block(&[("V", &long)]);
    dat.extend(block(&[("V", "2")]));

    let events = decode(&dat);
    assert_eq!(error_kinds(&events), [DecodeErrorKind::Framing]);
    assert_eq!(records(&events).len(), 1);
}

#[test]
fn oversized_block_is_rejected() {
    let labels: Vec<String> = (0..65).map(|i| format!("L{i}")).collect();
    let fields: Vec<(&str, &str)> = labels.iter().map(|l| (l.as_str(), "0")).collect();
    let mut dat = block(&fields);
    dat.extend(block(&[("V", "2")]));

    let events = decode(&dat);
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(
        events[0],
        Event::Error(DecodeError::BlockTooLarge {
            fields: 65,
            max: DecoderConfig::MAX_FIELDS
        })
    );
    assert!(events[1].is_record());
}

#[test]
fn max_fields_is_accepted() {
    let labels: Vec<String> = (0..64).map(|i| format!("L{i}")).collect();
    let fields: Vec<(&str, &str)> = labels.iter().map(|l| (l.as_str(), "0")).collect();
    let events = decode(&block(&fields));
    assert_eq!(records(&events)[0].len(), 64);
}

#[test]
fn truncated_block_produces_no_events() {
    let mut decoder = Decoder::new();
    assert_eq!(decoder.feed(b"\r\nV\t12353").count(), 0);

    // the truncated field runs into the next block, which then fails
    let events: Vec<Event> = decoder.feed(&block(&[("V", "1")])).collect();
    assert_eq!(error_kinds(&events), [DecodeErrorKind::ChecksumMismatch]);

    let events: Vec<Event> = decoder.feed(&block(&[("V", "2")])).collect();
    assert_eq!(records(&events)[0].get_str("V"), Some("2"));
}

#[test]
fn recovers_after_every_error_kind() {
    let mut bad_checksum = block(&[("V", "1")]);
    let last = bad_checksum.len() - 1;
    bad_checksum[last] ^= 0x80;
    let labels: Vec<String> = (0..70).map(|i| format!("L{i}")).collect();
    let fields: Vec<(&str, &str)> = labels.iter().map(|l| (l.as_str(), "0")).collect();

    let bad_blocks = [
        bad_checksum,
        block(&[("LABELTOOLONG", "1")]),
        block(&[("V", &"1".repeat(34))]),
        block(&fields),
    ];

    for bad in bad_blocks {
        let mut dat = bad;
        dat.extend(block(&[("V", "ok")]));
        let events = decode(&dat);

        assert_eq!(events.len(), 2, "{events:?}");
        assert!(!events[0].is_record());
        let record = events[1].clone().into_result().unwrap();
        assert_eq!(record.fields().len(), 1);
        assert_eq!(record.get_str("V"), Some("ok"));
    }
}

#[test]
fn garbage_between_blocks_is_skipped() {
    let mut dat = b"\x00\xff:7F0ED0071\n".to_vec();
    dat.extend(block(&[("V", "1")]));
    dat.extend(b"\x13\x37");
    dat.extend(block(&[("V", "2")]));

    let mut decoder = Decoder::new();
    let events: Vec<Event> = decoder.feed(&dat).collect();
    assert_eq!(records(&events).len(), 2);
    assert!(error_kinds(&events).is_empty());
    // leading garbage, then the CR opening each block
    assert_eq!(decoder.stats().unsynced_bytes, 13 + 1 + 2 + 1);
}
