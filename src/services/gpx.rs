//! GPX reader and writer for ride routes.
//!
//! Reading extracts:
//! - Track points: `lat`/`lon` attributes of every `<trkpt>`, in document order
//!   (`<rtept>` is used only when the document has no track points at all)
//! - Route name: `<metadata><name>`, else the first `<trk>`/`<rte>` name
//!
//! Writing produces a minimal GPX 1.1 document with one track and one segment.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::services::geo::TrackPoint;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const GPX_CREATOR: &str = "ride-forecast-api";

/// Errors that can occur during GPX parsing or writing.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("IO error writing GPX: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("GPX output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid field value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Route data read from a GPX document.
#[derive(Debug, Clone)]
pub struct ParsedGpx {
    /// Route name, if the document names one
    pub name: Option<String>,
    /// Track points in document order (may be empty)
    pub points: Vec<TrackPoint>,
}

/// Which element a text event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameContext {
    Metadata,
    TrackOrRoute,
}

/// Parse GPX XML and extract the route name and its points.
pub fn parse_gpx(gpx_xml: &str) -> Result<ParsedGpx, GpxError> {
    let mut reader = Reader::from_str(gpx_xml);

    let mut track_points: Vec<TrackPoint> = Vec::new();
    let mut route_points: Vec<TrackPoint> = Vec::new();

    let mut metadata_name: Option<String> = None;
    let mut track_name: Option<String> = None;

    // Track nesting context
    let mut in_metadata = false;
    let mut in_author = false;
    let mut in_trk_or_rte = false;
    let mut in_point = false;

    // Element whose text content we are currently capturing
    let mut current_name: Option<NameContext> = None;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = local_name_str(e.name().as_ref());
                match local.as_str() {
                    "metadata" => in_metadata = true,
                    "author" if in_metadata => in_author = true,
                    "trk" | "rte" => in_trk_or_rte = true,
                    "trkpt" => {
                        in_point = true;
                        track_points.push(read_point(e, "trkpt")?);
                    }
                    "rtept" => {
                        in_point = true;
                        route_points.push(read_point(e, "rtept")?);
                    }
                    "name" if in_metadata && !in_author => {
                        current_name = Some(NameContext::Metadata);
                    }
                    "name" if in_trk_or_rte && !in_point => {
                        current_name = Some(NameContext::TrackOrRoute);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = local_name_str(e.name().as_ref());
                match local.as_str() {
                    "trkpt" => track_points.push(read_point(e, "trkpt")?),
                    "rtept" => route_points.push(read_point(e, "rtept")?),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(context) = current_name {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        match context {
                            NameContext::Metadata => metadata_name = Some(text),
                            NameContext::TrackOrRoute => {
                                if track_name.is_none() {
                                    track_name = Some(text);
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let local = local_name_str(e.name().as_ref());
                current_name = None;
                match local.as_str() {
                    "metadata" => in_metadata = false,
                    "author" if in_author => in_author = false,
                    "trk" | "rte" => in_trk_or_rte = false,
                    "trkpt" | "rtept" => in_point = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let points = if track_points.is_empty() {
        if !route_points.is_empty() {
            tracing::debug!(
                "GPX has no <trkpt> elements, using {} <rtept> elements",
                route_points.len()
            );
        }
        route_points
    } else {
        track_points
    };

    Ok(ParsedGpx {
        name: metadata_name.or(track_name),
        points,
    })
}

/// Read the required `lat`/`lon` attributes of a point element.
fn read_point(e: &BytesStart, element: &str) -> Result<TrackPoint, GpxError> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
        let val = std::str::from_utf8(&attr.value).unwrap_or("");
        match key {
            "lat" => lat = Some(parse_coordinate(val, element, "lat")?),
            "lon" => lon = Some(parse_coordinate(val, element, "lon")?),
            _ => {}
        }
    }

    let lat = lat.ok_or_else(|| GpxError::MissingField(format!("{} lat attribute", element)))?;
    let lon = lon.ok_or_else(|| GpxError::MissingField(format!("{} lon attribute", element)))?;
    Ok(TrackPoint { lat, lon })
}

fn parse_coordinate(val: &str, element: &str, attr: &str) -> Result<f64, GpxError> {
    val.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GpxError::InvalidValue {
            field: format!("{} {}", element, attr),
            message: format!("not a valid number: '{}'", val),
        })
}

/// Extract the local name from a potentially namespaced XML element name.
/// e.g. `gpx:trkpt` -> `trkpt`, `trkpt` -> `trkpt`
fn local_name_str(full: &[u8]) -> String {
    let s = std::str::from_utf8(full).unwrap_or("");
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.to_string(),
    }
}

/// Build a GPX 1.1 document containing a single track with one segment.
///
/// The route name is XML-escaped into both `<metadata><name>` and
/// `<trk><name>`. Coordinates are written at full `f64` precision so parsing
/// the output yields the input points.
pub fn create_gpx_from_coordinates(points: &[TrackPoint], name: &str) -> Result<String, GpxError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let gpx = BytesStart::new("gpx").with_attributes([
        ("xmlns", GPX_NAMESPACE),
        ("version", "1.1"),
        ("creator", GPX_CREATOR),
    ]);
    writer.write_event(Event::Start(gpx))?;

    writer.write_event(Event::Start(BytesStart::new("metadata")))?;
    write_text_element(&mut writer, "name", name)?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    write_text_element(&mut writer, "name", name)?;
    writer.write_event(Event::Start(BytesStart::new("trkseg")))?;

    for p in points {
        let lat = p.lat.to_string();
        let lon = p.lon.to_string();
        let trkpt =
            BytesStart::new("trkpt").with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]);
        writer.write_event(Event::Empty(trkpt))?;
    }

    writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    writer.write_event(Event::End(BytesEnd::new("gpx")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &str,
    text: &str,
) -> Result<(), GpxError> {
    writer.write_event(Event::Start(BytesStart::new(element)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(element)))?;
    Ok(())
}
