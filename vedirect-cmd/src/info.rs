use std::collections::{btree_map::Entry, BTreeMap};
use std::io::{stdout, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use tracing::debug;
use vedirect::text::{decode_events, DecodeErrorKind, DecodeStats, DecoderConfig, Event};

use crate::Format;

#[derive(Default, Debug, Clone, Serialize)]
struct LabelSummary {
    count: usize,
    last_value: String,
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    input: String,
    stats: DecodeStats,
    errors: BTreeMap<String, usize>,
    labels: BTreeMap<String, LabelSummary>,
}

fn summarize<R: Read>(input: &Path, reader: R, config: DecoderConfig) -> Result<Info> {
    let mut events = decode_events(reader, config)?;
    let mut errors: BTreeMap<String, usize> = BTreeMap::default();
    let mut labels: BTreeMap<String, LabelSummary> = BTreeMap::default();

    for zult in events.by_ref() {
        match zult.context("reading input")? {
            Event::Record(record) => {
                for field in record.into_fields() {
                    let value = String::from_utf8_lossy(&field.value).into_owned();
                    match labels.entry(field.label) {
                        Entry::Vacant(e) => {
                            e.insert(LabelSummary {
                                count: 1,
                                last_value: value,
                            });
                        }
                        Entry::Occupied(mut e) => {
                            let summary = e.get_mut();
                            summary.count += 1;
                            summary.last_value = value;
                        }
                    }
                }
            }
            Event::Error(err) => {
                debug!("{err}");
                let kind = match err.kind() {
                    DecodeErrorKind::Framing => "framing",
                    DecodeErrorKind::ChecksumMismatch => "checksum",
                    DecodeErrorKind::BlockTooLarge => "too_large",
                };
                *errors.entry(kind.to_string()).or_default() += 1;
            }
        }
    }

    Ok(Info {
        input: input.to_string_lossy().to_string(),
        stats: events.decoder().stats().clone(),
        errors,
        labels,
    })
}

pub fn info<R: Read>(input: &Path, reader: R, config: DecoderConfig, format: &Format) -> Result<()> {
    let info = summarize(input, reader, config)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(right_pad: |num: u64, v: Json| {
        let mut s = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let num = usize::try_from(num).unwrap_or(usize::MAX);
        while s.len() < num {
            s.push(' ');
        }
        s
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("rpad", Box::new(right_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("registering template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ input }}
===============================================================================
Bytes:     {{ stats.bytes }} ({{ stats.unsynced_bytes }} outside of blocks)
Records:   {{ stats.records }}
Checksum:  {{ stats.checksum_errors }}
Framing:   {{ stats.framing_errors }}
Too large: {{ stats.oversized_blocks }}
Partial:   {{ stats.partial_blocks }}
-------------------------------------------------------------------------------
Label      Count      Last value
-------------------------------------------------------------------------------
{{ #each labels }}{{ rpad 10 @key }} {{ rpad 10 count }} {{ last_value }}
{{/each }}
";
