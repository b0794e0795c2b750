use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::XlsxError;

/// Parse `xl/sharedStrings.xml` into the plain text of each `<si>` item.
///
/// Rich-text runs are flattened; phonetic (`<rPh>`) runs are not part of the displayed
/// string and are skipped.
pub fn parse_shared_strings_xml(xml: &str) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(parse_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => items.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn parse_si(reader: &mut Reader<&[u8]>) -> Result<String, XlsxError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, e.name())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"r" => depth += 1,
            Event::End(e) if e.local_name().as_ref() == b"r" => depth = depth.saturating_sub(1),
            Event::Start(e) => {
                // `<rPh>`, `<rPr>`, extensions: nothing visible inside.
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if depth == 0 && e.local_name().as_ref() == b"si" => break,
            Event::Eof => return Err(XlsxError::Invalid("unexpected eof in <si>".to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String, XlsxError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => {
                let t: Cow<'_, str> = e.unescape()?;
                text.push_str(&t);
            }
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::End(e) if e.name() == end => break,
            Event::Eof => return Err(XlsxError::Invalid("unexpected eof in text".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}
