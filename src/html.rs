use crate::extract::{Advisory, RequestSummary, TraceEvent};

pub fn render_html(summary: &RequestSummary, timeline: &[TraceEvent], insights: &[String], advisories: &[Advisory], theme: crate::Theme) -> String {
    let mut s = String::new();
    s.push_str("<html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>FrebDoctor Report</title><style>");
    match theme {
        crate::Theme::Dark => s.push_str(":root{--bg:#0a0e13;--fg:#ffffff;--muted:#c0c4cc;--card:#0d131a;--border:#243041;--accent:#3b82f6;--ok:#22c55e;--warn:#f59e0b;--err:#ef4444;--chip:#0f172a} body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} .container{max-width:1200px;margin:0 auto;padding:24px} .header{display:flex;align-items:center;justify-content:space-between;gap:12px;margin-bottom:16px} .title{font-size:20px;font-weight:600;letter-spacing:.2px} .sub{color:var(--muted);font-size:13px} .grid{display:grid;grid-template-columns:repeat(4,minmax(0,1fr));gap:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px;box-shadow:0 1px 0 rgba(255,255,255,.03) inset} .metric{display:flex;flex-direction:column;gap:4px} .metric .label{color:var(--muted);font-size:12px} .metric .value{font-size:18px;font-weight:700;overflow-wrap:anywhere} .value.err{color:var(--err)} .value.warn{color:var(--warn)} .value.ok{color:var(--ok)} .section{margin-top:18px} .section h3{margin:0 0 10px 0;font-size:16px;font-weight:600} .table{width:100%;border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden} .table th{position:sticky;top:0;background:#0c1118;color:#ffffff;text-align:left;font-weight:600;padding:10px;border-bottom:1px solid var(--border)} .table td{padding:10px;border-bottom:1px solid var(--border);vertical-align:top} .table tr:nth-child(odd) td{background:#0b0f14} .pill{display:inline-block;background:#0c1118;color:#ffffff;padding:6px 10px;border-radius:999px;border:1px solid var(--border);font-size:12px;margin:4px 6px 0 0} .chip{display:inline-flex;align-items:center;gap:6px;background:var(--chip);color:#ffffff;border:1px solid var(--border);border-radius:999px;padding:4px 10px;font-size:12px;margin:4px 6px 0 0} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:900px){.grid{grid-template-columns:repeat(2,minmax(0,1fr))}} @media (max-width:600px){.grid{grid-template-columns:1fr}.header{flex-direction:column;align-items:flex-start}}"),
        crate::Theme::Light => s.push_str(":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb;--accent:#2563eb;--ok:#16a34a;--warn:#d97706;--err:#dc2626;--chip:#eef2f7} body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} .container{max-width:1200px;margin:0 auto;padding:24px} .header{display:flex;align-items:center;justify-content:space-between;gap:12px;margin-bottom:16px} .title{font-size:20px;font-weight:600;letter-spacing:.2px} .sub{color:var(--muted);font-size:13px} .grid{display:grid;grid-template-columns:repeat(4,minmax(0,1fr));gap:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px;box-shadow:0 1px 0 rgba(0,0,0,.04)} .metric{display:flex;flex-direction:column;gap:4px} .metric .label{color:var(--muted);font-size:12px} .metric .value{font-size:18px;font-weight:700;overflow-wrap:anywhere} .value.err{color:var(--err)} .value.warn{color:var(--warn)} .value.ok{color:var(--ok)} .section{margin-top:18px} .section h3{margin:0 0 10px 0;font-size:16px;font-weight:600} .table{width:100%;border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden} .table th{position:sticky;top:0;background:#f3f4f6;color:var(--fg);text-align:left;font-weight:600;padding:10px;border-bottom:1px solid var(--border)} .table td{padding:10px;border-bottom:1px solid var(--border);vertical-align:top} .table tr:nth-child(odd) td{background:#fbfdff} .pill{display:inline-block;background:#eef2f7;color:var(--fg);padding:6px 10px;border-radius:999px;border:1px solid var(--border);font-size:12px;margin:4px 6px 0 0} .chip{display:inline-flex;align-items:center;gap:6px;background:var(--chip);color:var(--fg);border:1px solid var(--border);border-radius:999px;padding:4px 10px;font-size:12px;margin:4px 6px 0 0} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:900px){.grid{grid-template-columns:repeat(2,minmax(0,1fr))}} @media (max-width:600px){.grid{grid-template-columns:1fr}.header{flex-direction:column;align-items:flex-start}}"),
    }
    s.push_str("</style><script>(function(){const light={bg:'#f7fafc',fg:'#111827',muted:'#6b7280',card:'#ffffff',border:'#e5e7eb',accent:'#2563eb',ok:'#16a34a',warn:'#d97706',err:'#dc2626',chip:'#eef2f7'};const dark={bg:'#0f1216',fg:'#e5e7eb',muted:'#9aa0a6',card:'#141820',border:'#1f2430',accent:'#3b82f6',ok:'#22c55e',warn:'#f59e0b',err:'#ef4444',chip:'#1f2937'};function apply(vars){const r=document.documentElement.style;Object.entries(vars).forEach(([k,v])=>r.setProperty('--'+k,v));document.body.style.background='var(--bg)';document.body.style.color='var(--fg)';}window.__fdTheme=window.__fdTheme||'';window.toggleTheme=function(){const curr=window.__fdTheme==='light'?'dark':'light';window.__fdTheme=curr;apply(curr==='light'?light:dark);const btn=document.getElementById('themeToggle');if(btn){btn.textContent=curr==='light'?'Dark Mode':'Light Mode';}};})();</script></head><body><div class=\"container\">");
    s.push_str("<div class=\"header\"><div><div class=\"title\">FrebDoctor Report</div>");
    s.push_str(&format!("<div class=\"sub\">{}</div></div>", html_escape(&summary.url)));
    s.push_str(&format!("<button id=\"themeToggle\" class=\"pill\" onclick=\"toggleTheme()\">{}</button>", match theme { crate::Theme::Light => "Dark Mode", _ => "Light Mode" }));
    s.push_str("</div>");
    s.push_str("<div class=\"grid\">");
    let status = format!("{}.{}", summary.status_code, summary.sub_status_code);
    let status_cls = match summary.status_code.as_str() { "404" | "500" => "value err", _ => "value" };
    let cause_cls = if summary.root_cause == "Unknown" { "value" } else { "value warn" };
    metric(&mut s, "URL", &summary.url, "value");
    metric(&mut s, "Status Code", &status, status_cls);
    metric(&mut s, "Time Taken", &format!("{} ms", summary.time_taken), "value");
    metric(&mut s, "Root Cause", &summary.root_cause, cause_cls);
    metric(&mut s, "Site", &summary.site_id, "value");
    metric(&mut s, "Process", &summary.process_id, "value");
    metric(&mut s, "App Pool", &summary.app_pool_id, "value");
    metric(&mut s, "Authentication", &summary.authentication, "value");
    metric(&mut s, "User", &summary.user_name, "value");
    metric(&mut s, "Activity ID", &summary.activity_id, "value");
    metric(&mut s, "Verb", &summary.verb, "value");
    metric(&mut s, "Events", &timeline.len().to_string(), "value");
    s.push_str("</div>");
    if !insights.is_empty() {
        s.push_str("<div class=\"section\"><h3>Insights</h3><div class=\"card\">");
        for i in insights { s.push_str(&format!("<div class=\"pill\">{}</div>", html_escape(i))); }
        s.push_str("</div></div>");
    }
    if !advisories.is_empty() {
        s.push_str("<div class=\"section\"><h3>Advisories</h3><div class=\"card\">");
        for a in advisories { s.push_str(&format!("<span class=\"chip\">{}</span>", html_escape(&a.message()))); }
        s.push_str("</div></div>");
    }
    s.push_str("<div class=\"section\"><h3>Event Timeline</h3>");
    if timeline.is_empty() {
        s.push_str("<div class=\"card sub\">No events found in the trace.</div>");
    } else {
        s.push_str("<table class=\"table\"><thead><tr><th>Time (ms)</th><th>Event Name</th><th>Provider</th><th>Reason</th></tr></thead><tbody>");
        for e in timeline {
            s.push_str(&format!("<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>", e.time_ms, html_escape(&e.event_name), html_escape(&e.provider), html_escape(&e.reason)));
        }
        s.push_str("</tbody></table>");
    }
    s.push_str("</div>");
    s.push_str("<div class=\"footer\">Generated by FrebDoctor</div></div><script>(function(){var init=");
    s.push_str(match theme { crate::Theme::Light => "'light'", _ => "'dark'" });
    s.push_str("; window.__fdTheme=init; toggleTheme();})();</script></body></html>");
    s
}

fn metric(s: &mut String, label: &str, value: &str, cls: &str) {
    s.push_str(&format!("<div class=\"card metric\"><div class=\"label\">{}</div><div class=\"{}\">{}</div></div>", label, cls, html_escape(value)));
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;

    fn sample() -> extract::TraceReport {
        extract::analyze(b"<failedRequest url=\"http://x/?a=1&amp;b=2\" statusCode=\"500\" subStatusCode=\"0\" timeTaken=\"31\"><event time=\"1\" reason=\"a&lt;b\"><name>MODULE_SET_RESPONSE_ERROR_STATUS</name><providerName>WWW Server</providerName></event></failedRequest>").unwrap()
    }

    #[test]
    fn escapes_dynamic_text() {
        let rep = sample();
        let html = render_html(&rep.summary, &rep.timeline, &[], &rep.advisories, crate::Theme::Dark);
        assert!(html.contains("http://x/?a=1&amp;b=2"));
        assert!(html.contains("a&lt;b"));
    }

    #[test]
    fn renders_summary_and_timeline() {
        let rep = sample();
        let insights = vec!["Total Events: 1".to_string()];
        let html = render_html(&rep.summary, &rep.timeline, &insights, &rep.advisories, crate::Theme::Light);
        assert!(html.contains("500.0"));
        assert!(html.contains("Server Error (Review modules/logs)"));
        assert!(html.contains("MODULE_SET_RESPONSE_ERROR_STATUS"));
        assert!(html.contains("Total Events: 1"));
    }

    #[test]
    fn empty_timeline_renders_placeholder() {
        let rep = extract::analyze(b"<failedRequest/>").unwrap();
        let html = render_html(&rep.summary, &rep.timeline, &[], &rep.advisories, crate::Theme::Dark);
        assert!(html.contains("No events found in the trace."));
    }
}
