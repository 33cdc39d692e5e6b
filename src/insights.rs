use crate::extract::{Advisory, RequestSummary, TraceEvent};

/// Reading aids derived from one document. Expects the timeline already
/// time-sorted; pure function, no I/O.
pub fn generate_insights(summary: &RequestSummary, timeline: &[TraceEvent], advisories: &[Advisory]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    out.push(format!("Total Events: {}", timeline.len()));
    out.push(format!("Recommendation: For {}, inspect the error in the timeline.", summary.root_cause));
    if let Some(slowest) = timeline.iter().max_by_key(|e| e.time_ms)
        && slowest.time_ms > 0 {
        out.push(format!("Slowest step: {} at {} ms", slowest.event_name, slowest.time_ms));
    }
    if let Some((before, after, gap)) = widest_gap(timeline) {
        let span = timeline[timeline.len() - 1].time_ms - timeline[0].time_ms;
        if span > 0 && gap * 2 > span {
            out.push(format!("Large gap: {} ms between {} and {}", gap, before, after));
        }
    }
    if !advisories.is_empty() {
        out.push(format!("{} event(s) had a missing or unusable time attribute; positions were synthesized.", advisories.len()));
    }
    out
}

fn widest_gap(timeline: &[TraceEvent]) -> Option<(&str, &str, i64)> {
    timeline.windows(2)
        .map(|w| (w[0].event_name.as_str(), w[1].event_name.as_str(), w[1].time_ms - w[0].time_ms))
        .max_by_key(|(_, _, gap)| *gap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_404() -> RequestSummary {
        RequestSummary {
            url: "http://x/".to_string(),
            status_code: "404".to_string(),
            sub_status_code: "0".to_string(),
            time_taken: "15".to_string(),
            site_id: "1".to_string(),
            process_id: "4".to_string(),
            app_pool_id: "p".to_string(),
            authentication: "anonymous".to_string(),
            user_name: "IUSR".to_string(),
            activity_id: "{A}".to_string(),
            verb: "GET".to_string(),
            root_cause: "File Not Found (Check physical path)".to_string(),
        }
    }

    fn ev(i: usize, ms: i64, name: &str) -> TraceEvent {
        TraceEvent { sequence_index: i, time_ms: ms, event_name: name.to_string(), provider: String::new(), reason: String::new() }
    }

    #[test]
    fn empty_timeline_still_reports_totals() {
        let lines = generate_insights(&summary_404(), &[], &[]);
        assert_eq!(lines[0], "Total Events: 0");
        assert!(lines[1].contains("File Not Found"));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn slowest_and_gap_callouts() {
        let tl = vec![ev(0, 0, "START"), ev(1, 2, "AUTH"), ev(2, 90, "END")];
        let lines = generate_insights(&summary_404(), &tl, &[]);
        assert!(lines.iter().any(|l| l.contains("Slowest step: END at 90 ms")));
        assert!(lines.iter().any(|l| l.contains("Large gap: 88 ms between AUTH and END")));
    }

    #[test]
    fn advisory_count_is_surfaced() {
        let tl = vec![ev(0, 0, "A")];
        let adv = vec![Advisory { sequence_index: 0, raw_time: None, fallback_ms: 0 }];
        let lines = generate_insights(&summary_404(), &tl, &adv);
        assert!(lines.iter().any(|l| l.starts_with("1 event(s)")));
    }

    #[test]
    fn no_gap_callout_for_even_spacing() {
        let tl = vec![ev(0, 0, "A"), ev(1, 10, "B"), ev(2, 20, "C")];
        let lines = generate_insights(&summary_404(), &tl, &[]);
        assert!(!lines.iter().any(|l| l.starts_with("Large gap")));
    }
}
