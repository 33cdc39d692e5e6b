use serde::Serialize;
use thiserror::Error;

use crate::trace_xml::{self, Element, TRACE_NS, XmlError};

/// Sentinel shown for any summary attribute the trace did not carry.
pub const NA: &str = "N/A";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("XML parsing error: {0}")]
    MalformedXml(#[from] XmlError),
    #[error("missing or unrecognized <failedRequest> root tag (found: {found})")]
    InvalidRootTag { found: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct RequestSummary {
    pub url: String,
    pub status_code: String,
    pub sub_status_code: String,
    pub time_taken: String,
    pub site_id: String,
    pub process_id: String,
    pub app_pool_id: String,
    pub authentication: String,
    pub user_name: String,
    pub activity_id: String,
    pub verb: String,
    pub root_cause: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TraceEvent {
    pub sequence_index: usize,
    pub time_ms: i64,
    pub event_name: String,
    pub provider: String,
    pub reason: String,
}

/// Non-aborting note attached when one event's `time` attribute was unusable
/// and its position had to be synthesized.
#[derive(Clone, Debug, Serialize)]
pub struct Advisory {
    pub sequence_index: usize,
    pub raw_time: Option<String>,
    pub fallback_ms: i64,
}

impl Advisory {
    pub fn message(&self) -> String {
        match self.raw_time.as_ref() {
            Some(raw) => format!("event #{}: unusable time attribute {:?}, using {} ms", self.sequence_index, raw, self.fallback_ms),
            None => format!("event #{}: missing time attribute, using {} ms", self.sequence_index, self.fallback_ms),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TraceReport {
    pub summary: RequestSummary,
    pub timeline: Vec<TraceEvent>,
    pub advisories: Vec<Advisory>,
}

pub fn validate_root(root: &Element) -> Result<&Element, ExtractError> {
    if root.local == "failedRequest" {
        Ok(root)
    } else {
        Err(ExtractError::InvalidRootTag { found: root.display_name() })
    }
}

/// Coarse classification from the raw status-code string. Only the two
/// literal codes are recognized; no numeric coercion, no 4xx/5xx families.
pub fn root_cause(status_code: &str) -> &'static str {
    match status_code {
        "404" => "File Not Found (Check physical path)",
        "500" => "Server Error (Review modules/logs)",
        _ => "Unknown",
    }
}

fn attr_or_na(el: &Element, name: &str) -> String {
    el.attr(name).unwrap_or(NA).to_string()
}

fn extract_verb(root: &Element) -> String {
    for data in root.descendants_any_form("data", TRACE_NS) {
        let Some(name) = data.find_child("name", TRACE_NS) else { continue };
        if name.text != "VERB" { continue; }
        if let Some(value) = data.find_child("value", TRACE_NS) { return value.text.clone(); }
    }
    NA.to_string()
}

pub fn extract_summary(root: &Element) -> RequestSummary {
    let status_code = attr_or_na(root, "statusCode");
    RequestSummary {
        url: attr_or_na(root, "url"),
        sub_status_code: attr_or_na(root, "subStatusCode"),
        time_taken: attr_or_na(root, "timeTaken"),
        site_id: attr_or_na(root, "siteId"),
        process_id: attr_or_na(root, "processId"),
        app_pool_id: attr_or_na(root, "appPoolId"),
        authentication: attr_or_na(root, "authentication"),
        user_name: attr_or_na(root, "userName"),
        activity_id: attr_or_na(root, "activityId"),
        verb: extract_verb(root),
        root_cause: root_cause(&status_code).to_string(),
        status_code,
    }
}

fn parse_time_ms(raw: &str) -> Option<i64> {
    let v = raw.trim().parse::<f64>().ok()?;
    if !v.is_finite() || v < 0.0 { return None; }
    Some(v.trunc() as i64)
}

/// Events in document order. Time-sorting is a presentation step; see
/// [`sort_timeline`].
pub fn extract_timeline(root: &Element) -> (Vec<TraceEvent>, Vec<Advisory>) {
    let mut timeline: Vec<TraceEvent> = Vec::new();
    let mut advisories: Vec<Advisory> = Vec::new();
    for (i, ev) in root.descendants("event", TRACE_NS).into_iter().enumerate() {
        let event_name = match ev.find_child("name", TRACE_NS) {
            Some(n) => n.text.clone(),
            None => "Unknown".to_string(),
        };
        let provider = ev.find_child("providerName", TRACE_NS).map(|p| p.text.clone()).unwrap_or_default();
        let reason = ev.attr("reason").unwrap_or_default().to_string();
        let fallback = (i as i64) * 10;
        let time_ms = match ev.attr("time") {
            Some(raw) if !raw.trim().is_empty() => match parse_time_ms(raw) {
                Some(ms) => ms,
                None => {
                    advisories.push(Advisory { sequence_index: i, raw_time: Some(raw.to_string()), fallback_ms: fallback });
                    fallback
                }
            },
            other => {
                advisories.push(Advisory { sequence_index: i, raw_time: other.map(|s| s.to_string()), fallback_ms: fallback });
                fallback
            }
        };
        timeline.push(TraceEvent { sequence_index: i, time_ms, event_name, provider, reason });
    }
    (timeline, advisories)
}

/// Stable ascending sort by `time_ms`; ties keep document order.
pub fn sort_timeline(timeline: &mut [TraceEvent]) {
    timeline.sort_by_key(|e| e.time_ms);
}

/// Serializes a (time-sorted) timeline as UTF-8 CSV. Byte-deterministic for
/// identical input; an empty timeline yields the header row only.
pub fn timeline_csv(timeline: &[TraceEvent]) -> Result<Vec<u8>, csv::Error> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(["Time (ms)", "Event Name", "Provider", "Reason"])?;
        for e in timeline {
            wtr.write_record([e.time_ms.to_string(), e.event_name.clone(), e.provider.clone(), e.reason.clone()])?;
        }
        wtr.flush()?;
    }
    Ok(buf)
}

/// Single-pass convenience: parse, validate the root, extract everything.
/// Nothing here shares state across documents.
pub fn analyze(bytes: &[u8]) -> Result<TraceReport, ExtractError> {
    let doc = trace_xml::parse(bytes)?;
    let root = validate_root(&doc)?;
    let summary = extract_summary(root);
    let (timeline, advisories) = extract_timeline(root);
    Ok(TraceReport { summary, timeline, advisories })
}
