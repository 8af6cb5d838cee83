//! SCAP data-stream ingestion
//!
//! Data-stream collections (`ssg-<product>-ds.xml`) run to tens of megabytes,
//! most of it OVAL checks and CPE dictionaries. The parser streams tokens with
//! `quick-xml`, picks up the `data-stream` attributes, decodes the first XCCDF
//! `Benchmark` subtree into a small owned tree and stops reading there.
//!
//! ```text
//! data-stream-collection
//!   data-stream  (id, scap-version, timestamp)
//!   component
//!     Benchmark
//!       Profile*  (select idref selected)
//!       Group*    (Group*, Rule*)
//! ```

use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use ssgkb_model::ids::{self, DataStreamName};
use ssgkb_model::{DataStream, ParsedDataStream, SsgError, SsgResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

mod benchmark;
mod element;
mod normalize;

pub use normalize::{escape_text, normalize_markup};

const READ_BUFFER: usize = 256 * 1024;

/// Parse a data-stream file. The name is checked before the file is opened.
pub fn parse_data_stream_file(path: &Path) -> SsgResult<ParsedDataStream> {
    let name = data_stream_name(path)?;
    let file = File::open(path).map_err(|e| SsgError::io_read(path, &e))?;
    let reader = BufReader::with_capacity(READ_BUFFER, file);
    read_data_stream(reader, &name)
}

/// Parse a data stream from any buffered reader; `filename` supplies the
/// product and must follow `ssg-<product>-ds.xml`.
pub fn parse_data_stream<R: BufRead>(reader: R, filename: &str) -> SsgResult<ParsedDataStream> {
    let name = data_stream_name(Path::new(filename))?;
    read_data_stream(reader, &name)
}

fn data_stream_name(path: &Path) -> SsgResult<DataStreamName> {
    ids::parse_data_stream_name(path).ok_or_else(|| {
        SsgError::invalid(format!(
            "data stream file name does not match ssg-<product>-ds.xml: {}",
            path.display()
        ))
    })
}

#[derive(Default)]
struct StreamAttributes {
    id: Option<String>,
    scap_version: String,
    timestamp: String,
}

fn read_data_stream<R: BufRead>(reader: R, name: &DataStreamName) -> SsgResult<ParsedDataStream> {
    let mut reader = Reader::from_reader(reader);
    let mut buf = Vec::with_capacity(8192);
    let mut stream: Option<StreamAttributes> = None;

    let root = loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            SsgError::invalid(format!(
                "{}: malformed XML at byte {}: {e}",
                name.id,
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(e) | Event::Empty(e)
                if stream.is_none() && e.local_name().as_ref() == b"data-stream" =>
            {
                let el = element::XmlElement::from_start(&e);
                stream = Some(StreamAttributes {
                    id: el.attr("id").map(str::trim).filter(|s| !s.is_empty()).map(String::from),
                    scap_version: el.attr("scap-version").unwrap_or_default().to_string(),
                    timestamp: el.attr("timestamp").unwrap_or_default().to_string(),
                });
            }
            Event::Start(e) if e.local_name().as_ref() == b"Benchmark" => {
                break element::XmlElement::from_start(&e);
            }
            Event::Eof => {
                return Err(SsgError::invalid(format!("{}: no Benchmark element", name.id)));
            }
            _ => {}
        }
    };

    let root = element::read_subtree(&mut reader, root, &mut buf)?;
    // Everything after the Benchmark end tag is left unread.
    drop(reader);

    let attrs = stream.unwrap_or_default();
    let data_stream_id = attrs.id.unwrap_or_else(|| name.id.clone());
    let now = Utc::now();
    let content = benchmark::decode_benchmark(&root, &data_stream_id, now)?;

    tracing::debug!(
        data_stream = %data_stream_id,
        benchmark = %content.benchmark.id,
        profiles = content.profiles.len(),
        groups = content.groups.len(),
        rules = content.rules.len(),
        "parsed data stream"
    );

    Ok(ParsedDataStream {
        data_stream: DataStream {
            id: data_stream_id,
            product: name.product.clone(),
            scap_version: attrs.scap_version,
            timestamp: attrs.timestamp,
            created_at: now,
            updated_at: now,
        },
        benchmark: content.benchmark,
        profiles: content.profiles,
        groups: content.groups,
        rules: content.rules,
    })
}
