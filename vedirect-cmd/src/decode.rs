use std::io::{stdout, Read, Write};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use vedirect::text::{spawn_decoder, DecodeError, DecoderConfig, Event, Record};

use crate::Format;

fn record_json(record: &Record) -> Value {
    let fields: Map<String, Value> = record
        .fields()
        .iter()
        .map(|f| {
            (
                f.label.clone(),
                Value::String(String::from_utf8_lossy(&f.value).into_owned()),
            )
        })
        .collect();
    Value::Object(fields)
}

fn render_record(record: &Record, format: &Format) -> String {
    match format {
        Format::Json => record_json(record).to_string(),
        Format::Text => record
            .fields()
            .iter()
            .map(|f| format!("{}={}", f.label, String::from_utf8_lossy(&f.value)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn render_error(err: &DecodeError, format: &Format) -> String {
    match format {
        Format::Json => json!({
            "error": format!("{:?}", err.kind()),
            "message": err.to_string(),
        })
        .to_string(),
        Format::Text => format!("error: {err}"),
    }
}

pub fn decode<R>(input: R, config: DecoderConfig, format: &Format, errors: bool) -> Result<()>
where
    R: Read + Send + 'static,
{
    let mut stream = spawn_decoder(input, config).context("starting decoder")?;
    let mut out = stdout().lock();

    for zult in stream.by_ref() {
        let line = match zult.context("reading input")? {
            Event::Record(record) => render_record(&record, format),
            Event::Error(err) => {
                if !errors {
                    warn!("{err}");
                    continue;
                }
                render_error(&err, format)
            }
        };
        writeln!(out, "{line}").context("writing to stdout")?;
    }

    if let Some(stats) = stream.stats() {
        info!(
            "{} records; {} checksum errors, {} framing errors, {} oversized blocks",
            stats.records, stats.checksum_errors, stats.framing_errors, stats.oversized_blocks
        );
    }
    Ok(())
}
