//! Strict event driver over quick-xml.
//!
//! A thin translation layer: quick-xml events map one-to-one onto the
//! abstract [`EventSink`] contract. quick-xml pre-decodes entity references
//! (and rejects undeclared ones), so this driver never calls `entity_ref`.
//! Any structural error is reported through `fatal` and ends the pass; the
//! orchestrator then retries with the lenient driver.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::BozoError;

use super::machine::EventSink;

pub(super) fn run(text: &str, sink: &mut impl EventSink) {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = true;

    loop {
        if sink.failed() {
            return;
        }
        match reader.read_event() {
            Err(error) => {
                sink.fatal(BozoError::NotWellFormed(error.to_string()));
                return;
            }
            Ok(Event::Eof) => return,
            Ok(Event::Start(start)) => {
                let Some((name, attrs)) = convert_start(&start, sink) else {
                    return;
                };
                sink.start_element(&name, &attrs);
            }
            Ok(Event::Empty(start)) => {
                let Some((name, attrs)) = convert_start(&start, sink) else {
                    return;
                };
                sink.start_element(&name, &attrs);
                sink.end_element(&name);
            }
            Ok(Event::End(end)) => match std::str::from_utf8(end.name().as_ref()) {
                Ok(name) => sink.end_element(name),
                Err(error) => {
                    sink.fatal(BozoError::NotWellFormed(error.to_string()));
                    return;
                }
            },
            Ok(Event::Text(chunk)) => match chunk.unescape() {
                Ok(decoded) => sink.characters(&decoded),
                Err(error) => {
                    sink.fatal(BozoError::NotWellFormed(error.to_string()));
                    return;
                }
            },
            Ok(Event::CData(cdata)) => {
                if let Ok(decoded) = std::str::from_utf8(&cdata) {
                    sink.cdata(decoded);
                }
            }
            Ok(Event::Comment(comment)) => {
                sink.comment(&String::from_utf8_lossy(&comment));
            }
            Ok(Event::Decl(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
        }
    }
}

fn convert_start(
    start: &BytesStart<'_>,
    sink: &mut impl EventSink,
) -> Option<(String, Vec<(String, String)>)> {
    let name = match std::str::from_utf8(start.name().as_ref()) {
        Ok(name) => name.to_owned(),
        Err(error) => {
            sink.fatal(BozoError::NotWellFormed(error.to_string()));
            return None;
        }
    };
    let mut attrs = Vec::new();
    for attribute in start.attributes() {
        match attribute {
            Ok(attribute) => {
                let key = match std::str::from_utf8(attribute.key.as_ref()) {
                    Ok(key) => key.to_owned(),
                    Err(error) => {
                        sink.fatal(BozoError::NotWellFormed(error.to_string()));
                        return None;
                    }
                };
                let value = match attribute.unescape_value() {
                    Ok(value) => value.into_owned(),
                    Err(error) => {
                        sink.fatal(BozoError::NotWellFormed(error.to_string()));
                        return None;
                    }
                };
                attrs.push((key, value));
            }
            Err(error) => {
                sink.fatal(BozoError::NotWellFormed(error.to_string()));
                return None;
            }
        }
    }
    Some((name, attrs))
}
