use crate::extract::{Advisory, RequestSummary, TraceEvent};

pub fn render_markdown(summary: &RequestSummary, timeline: &[TraceEvent], insights: &[String], advisories: &[Advisory]) -> String {
    let mut s = String::new();
    s.push_str("# FrebDoctor Report\n\n");
    s.push_str("## Request Summary\n");
    s.push_str(&format!("- URL: {}\n", summary.url));
    s.push_str(&format!("- Status Code: {}.{}\n", summary.status_code, summary.sub_status_code));
    s.push_str(&format!("- Time Taken: {} ms\n", summary.time_taken));
    s.push_str(&format!("- Root Cause: {}\n", summary.root_cause));
    s.push_str(&format!("- Site: {}\n", summary.site_id));
    s.push_str(&format!("- Process: {}\n", summary.process_id));
    s.push_str(&format!("- App Pool: {}\n", summary.app_pool_id));
    s.push_str(&format!("- Authentication: {}\n", summary.authentication));
    s.push_str(&format!("- User: {}\n", summary.user_name));
    s.push_str(&format!("- Activity ID: {}\n", summary.activity_id));
    s.push_str(&format!("- Verb: {}\n\n", summary.verb));

    s.push_str("## Insights\n");
    if insights.is_empty() { s.push_str("None\n\n"); } else {
        for i in insights { s.push_str(&format!("- {}\n", i.replace('\n', " "))); }
        s.push('\n');
    }

    s.push_str("## Event Timeline\n");
    if timeline.is_empty() {
        s.push_str("No events found in the trace.\n");
    } else {
        s.push_str("| Time (ms) | Event Name | Provider | Reason |\n");
        s.push_str("|---|---|---|---|\n");
        for e in timeline {
            s.push_str(&format!("| {} | {} | {} | {} |\n", e.time_ms, md_cell(&e.event_name), md_cell(&e.provider), md_cell(&e.reason)));
        }
    }
    s.push('\n');

    if !advisories.is_empty() {
        s.push_str("## Advisories\n");
        for a in advisories { s.push_str(&format!("- {}\n", a.message())); }
        s.push('\n');
    }
    s
}

fn md_cell(v: &str) -> String {
    v.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;

    #[test]
    fn renders_sections_and_escapes_pipes() {
        let rep = extract::analyze(b"<failedRequest url=\"http://x/\" statusCode=\"404\" subStatusCode=\"0\"><event time=\"2\" reason=\"a|b\"><name>E</name></event></failedRequest>").unwrap();
        let md = render_markdown(&rep.summary, &rep.timeline, &["Total Events: 1".to_string()], &rep.advisories);
        assert!(md.contains("# FrebDoctor Report"));
        assert!(md.contains("- Status Code: 404.0"));
        assert!(md.contains("| 2 | E |  | a\\|b |"));
        assert!(md.contains("- Total Events: 1"));
        assert!(!md.contains("## Advisories"));
    }

    #[test]
    fn empty_timeline_notes_absence() {
        let rep = extract::analyze(b"<failedRequest/>").unwrap();
        let md = render_markdown(&rep.summary, &rep.timeline, &[], &rep.advisories);
        assert!(md.contains("No events found in the trace."));
    }

    #[test]
    fn advisories_listed_when_present() {
        let rep = extract::analyze(b"<failedRequest><event/></failedRequest>").unwrap();
        let md = render_markdown(&rep.summary, &rep.timeline, &[], &rep.advisories);
        assert!(md.contains("## Advisories"));
        assert!(md.contains("missing time attribute"));
    }
}
