//! Document rendering and metadata enrichment.
//!
//! Fills a [`DocumentSkeleton`](crate::template::DocumentSkeleton) with one
//! row's values and injects the metadata the platform requires: the
//! canonical `uuid:`-prefixed instance identifier, the editing-user marker,
//! the location block, and the OpenRosa namespace declarations. The
//! platform's parser rejects documents missing those declarations even when
//! no element uses the prefix, so every rendered document passes through
//! [`ensure_namespace_declarations`] before upload.

use anyhow::Result;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use iaso_model::Row;

use crate::template::DocumentSkeleton;

pub const JR_NS: &str = "http://openrosa.org/javarosa";
pub const ORX_NS: &str = "http://openrosa.org/xforms";

/// Enrichment inputs beyond the row itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions<'a> {
    /// Instance UUID, with or without the `uuid:` prefix.
    pub instance_uuid: &'a str,
    /// User id recorded in the `<editUserID>` marker (updates).
    pub edit_user_id: Option<&'a str>,
    /// Remote numeric instance id, set on re-submissions so the platform
    /// can disambiguate them.
    pub iaso_instance_id: Option<i64>,
}

/// Canonical `uuid:<uuid>` form, idempotent on already-prefixed input.
pub fn canonical_instance_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix("uuid:").unwrap_or(trimmed);
    format!("uuid:{bare}")
}

/// Render one row into a submission document.
pub fn render_document(
    skeleton: &DocumentSkeleton,
    row: &Row,
    options: EnrichOptions<'_>,
) -> Result<String> {
    let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);

    let instance_attr = options.iaso_instance_id.map(|id| id.to_string());
    let mut root = BytesStart::new("data");
    root.push_attribute(("xmlns:jr", JR_NS));
    root.push_attribute(("xmlns:orx", ORX_NS));
    root.push_attribute(("id", skeleton.form_id.as_str()));
    root.push_attribute(("version", skeleton.version_id.as_str()));
    if let Some(value) = &instance_attr {
        root.push_attribute(("iasoInstance", value.as_str()));
    }
    xml.write_event(Event::Start(root))?;

    if let Some(group) = &skeleton.group {
        xml.write_event(Event::Start(BytesStart::new(group.as_str())))?;
    }
    for field in &skeleton.fields {
        let value = row
            .get(field)
            .map(|cell| cell.to_string())
            .unwrap_or_default();
        write_element(&mut xml, field, &value)?;
    }
    if let Some(group) = &skeleton.group {
        xml.write_event(Event::End(BytesEnd::new(group.as_str())))?;
    }

    if let (Some(latitude), Some(longitude)) = (row.latitude(), row.longitude()) {
        let altitude = row.altitude().unwrap_or(0.0);
        let accuracy = row.accuracy().unwrap_or(0.0);
        let gps = format!("{latitude} {longitude} {altitude} {accuracy}");
        write_element(&mut xml, "gps", &gps)?;
    }

    xml.write_event(Event::Start(BytesStart::new("meta")))?;
    write_element(
        &mut xml,
        "instanceID",
        &canonical_instance_id(options.instance_uuid),
    )?;
    if let Some(user_id) = options.edit_user_id {
        write_element(&mut xml, "editUserID", user_id)?;
    }
    xml.write_event(Event::End(BytesEnd::new("meta")))?;

    xml.write_event(Event::End(BytesEnd::new("data")))?;

    let rendered = String::from_utf8(xml.into_inner())?;
    ensure_namespace_declarations(&rendered)
}

fn write_element(xml: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        xml.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    xml.write_event(Event::Text(BytesText::new(value)))?;
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Re-declare required namespace prefixes on the document root.
///
/// Structured-document round-trips drop declarations for prefixes no element
/// uses; the upload endpoint requires them regardless. Documents already
/// carrying both declarations pass through byte-identical.
pub fn ensure_namespace_declarations(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut root_seen = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) if !root_seen => {
                root_seen = true;
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut rebuilt = BytesStart::new(name);
                let mut has_jr = false;
                let mut has_orx = false;
                for attribute in start.attributes() {
                    let attribute = attribute?;
                    match attribute.key.as_ref() {
                        b"xmlns:jr" => has_jr = true,
                        b"xmlns:orx" => has_orx = true,
                        _ => {}
                    }
                    rebuilt.push_attribute(attribute);
                }
                if !has_jr {
                    rebuilt.push_attribute(("xmlns:jr", JR_NS));
                }
                if !has_orx {
                    rebuilt.push_attribute(("xmlns:orx", ORX_NS));
                }
                writer.write_event(Event::Start(rebuilt))?;
            }
            event => writer.write_event(event)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner())?)
}
