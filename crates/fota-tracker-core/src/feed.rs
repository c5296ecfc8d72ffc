//! FOTA version feed parsing
//!
//! The FOTA server publishes one XML document per device and variant:
//!
//! ```xml
//! <versioninfo>
//!     <firmware>
//!         <version>
//!             <latest o="14">S926BXXS2AXK2/S926BOXM2AXK2/S926BXXS2AXK2</latest>
//!             <upgrade>
//!                 <value rcount="6" fwsize="1048576">S926BXXU1AXA1/...</value>
//!             </upgrade>
//!         </version>
//!     </firmware>
//! </versioninfo>
//! ```
//!
//! Only two things are extracted: the first `<latest>` element anywhere below
//! the root, and every `<value>` whose parent is an `<upgrade>` element.
//!
//! A `<latest>` holding only whitespace counts as absent, so the snapshot has
//! no `latest` key. Older snapshot files may hold `"latest": ""` for the same
//! feed; the two compare equal.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

use crate::firmware::{Snapshot, VersionRecord};
use crate::size::parse_size;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed document is empty")]
    EmptyDocument,
    #[error("Malformed feed XML: {0}")]
    Malformed(String),
    #[error("Invalid {attribute} value {value:?} for version {version:?}")]
    InvalidAttribute {
        version: String,
        attribute: &'static str,
        value: String,
    },
}

impl From<quick_xml::Error> for FeedError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<AttrError> for FeedError {
    fn from(e: AttrError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Text being collected for an element of interest
enum Capture {
    Latest(String),
    Value {
        text: String,
        rcount: String,
        fwsize: String,
    },
}

/// An open element on the parse stack
struct Frame {
    name: String,
    capture: Option<Capture>,
    /// Only text before the first child element counts as the element's text
    has_child: bool,
}

/// Parse a FOTA version feed into a snapshot
///
/// Well-formed documents without any `<latest>` or `<upgrade>/<value>`
/// elements produce an empty snapshot.
pub fn parse_feed(text: &str) -> Result<Snapshot, FeedError> {
    if text.trim().is_empty() {
        return Err(FeedError::EmptyDocument);
    }

    let mut reader = Reader::from_str(text);
    let mut snapshot = Snapshot::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;
    let mut latest_claimed = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                enter_element(&mut stack, &mut seen_root)?;
                let frame = open_frame(&e, &stack, &mut latest_claimed)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                enter_element(&mut stack, &mut seen_root)?;
                let frame = open_frame(&e, &stack, &mut latest_claimed)?;
                close_frame(frame, &mut snapshot)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| FeedError::Malformed("unexpected closing tag".to_string()))?;
                close_frame(frame, &mut snapshot)?;
            }
            Event::Text(t) => {
                let content = t.unescape()?;
                append_text(&mut stack, &content)?;
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c).into_owned();
                append_text(&mut stack, &content)?;
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(FeedError::Malformed(format!(
                        "unclosed element <{}>",
                        open.name
                    )));
                }
                if !seen_root {
                    return Err(FeedError::Malformed("no root element".to_string()));
                }
                break;
            }
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    debug!(
        latest = ?snapshot.latest,
        versions = snapshot.versions.len(),
        "Parsed firmware feed"
    );

    Ok(snapshot)
}

fn enter_element(stack: &mut [Frame], seen_root: &mut bool) -> Result<(), FeedError> {
    match stack.last_mut() {
        Some(parent) => parent.has_child = true,
        None if *seen_root => {
            return Err(FeedError::Malformed(
                "content after the root element".to_string(),
            ))
        }
        None => *seen_root = true,
    }
    Ok(())
}

fn open_frame(
    e: &BytesStart<'_>,
    stack: &[Frame],
    latest_claimed: &mut bool,
) -> Result<Frame, FeedError> {
    // Unquoted or duplicated attributes make the whole document malformed
    for attr in e.attributes() {
        attr?;
    }

    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let depth = stack.len();

    let capture = if name == "latest" && depth >= 1 && !*latest_claimed {
        *latest_claimed = true;
        Some(Capture::Latest(String::new()))
    } else if name == "value"
        && depth >= 2
        && stack.last().is_some_and(|parent| parent.name == "upgrade")
    {
        Some(Capture::Value {
            text: String::new(),
            rcount: attribute_or_zero(e, "rcount")?,
            fwsize: attribute_or_zero(e, "fwsize")?,
        })
    } else {
        None
    };

    Ok(Frame {
        name,
        capture,
        has_child: false,
    })
}

fn attribute_or_zero(e: &BytesStart<'_>, name: &str) -> Result<String, FeedError> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(attr.unescape_value()?.into_owned()),
        None => Ok("0".to_string()),
    }
}

fn append_text(stack: &mut [Frame], content: &str) -> Result<(), FeedError> {
    let Some(frame) = stack.last_mut() else {
        if content.trim().is_empty() {
            return Ok(());
        }
        return Err(FeedError::Malformed(
            "text outside the root element".to_string(),
        ));
    };

    if frame.has_child {
        return Ok(());
    }
    match &mut frame.capture {
        Some(Capture::Latest(text)) | Some(Capture::Value { text, .. }) => text.push_str(content),
        None => {}
    }
    Ok(())
}

fn close_frame(frame: Frame, snapshot: &mut Snapshot) -> Result<(), FeedError> {
    match frame.capture {
        Some(Capture::Latest(text)) => {
            let text = text.trim();
            if !text.is_empty() {
                snapshot.latest = Some(text.to_string());
            }
        }
        Some(Capture::Value {
            text,
            rcount,
            fwsize,
        }) => {
            let version = text.trim().to_string();
            check_count(&version, "rcount", &rcount)?;
            check_count(&version, "fwsize", &fwsize)?;
            snapshot.versions.push(VersionRecord {
                version,
                rcount,
                fwsize,
            });
        }
        None => {}
    }
    Ok(())
}

fn check_count(version: &str, attribute: &'static str, value: &str) -> Result<(), FeedError> {
    parse_size(value)
        .map(|_| ())
        .map_err(|_| FeedError::InvalidAttribute {
            version: version.to_string(),
            attribute,
            value: value.to_string(),
        })
}
