use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use comfy_table::{ContentArrangement, Table};
use regex::Regex;
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod extract;
mod html;
mod insights;
mod markdown;
mod scan;
mod stylesheet;
mod trace_xml;

use extract::{Advisory, RequestSummary, TraceEvent};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum TextFormat { Lines, Table }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme { Dark, Light }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum LogFormat { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum SortBy { Time, Name, Provider }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum SortOrder { Asc, Desc }

#[derive(Parser, Debug)]
#[command(
    name = "FrebDoctor",
    about = "IIS failed-request trace analyzer and reporter",
    long_about = "IIS failed-request trace analyzer that extracts the request summary and event timeline from FREB XML files and can emit text/JSON/CSV/Markdown/HTML reports.",
    after_long_help = "Examples:\n  FrebDoctor fr000031.xml\n  FrebDoctor fr000031.xml --text-format table --sort-by time\n  FrebDoctor fr000031.xml --csv-path timeline.csv --html report.html\n  FrebDoctor fr000031.xml --freb-html freb-report.html --xsl C:\\inetpub\\logs\\FailedReqLogFiles\\freb.xsl\n  FrebDoctor --scan-path C:\\inetpub\\logs\\FailedReqLogFiles\\W3SVC1 --recursive --output json",
    color = ColorChoice::Auto
)]
struct Args {
    /// Path to one failed-request trace XML file (e.g. fr000031.xml)
    #[arg(value_name = "TRACE_XML", conflicts_with = "scan_path")]
    input: Option<String>,
    /// Analyze every trace under this directory instead of a single file
    #[arg(long, short = 's')]
    scan_path: Option<String>,
    #[arg(long, short = 'g', help = "Glob for batch mode (default fr*.xml, case-insensitive)")]
    file_glob: Option<String>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, num_args = 0.., value_delimiter = ',', help = "Keep only timeline events matching any regex (name/provider/reason)")]
    patterns: Vec<String>,
    /// Maximum timeline rows shown on screen (exports are never capped)
    #[arg(long, short = 'n', default_value_t = 50)]
    top: usize,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, value_enum, default_value = "lines")]
    text_format: TextFormat,
    #[arg(long, value_enum, default_value = "dark")]
    theme: Theme,
    #[arg(long, value_enum, default_value = "time")]
    sort_by: SortBy,
    #[arg(long, value_enum, default_value = "asc")]
    sort_order: SortOrder,
    /// Path to the freb.xsl style sheet (default: beside the input, then ./freb.xsl)
    #[arg(long)]
    xsl: Option<String>,
    /// Render the vendor HTML report through the external XSLT engine
    #[arg(long)]
    freb_html: Option<String>,
    /// Write the native HTML report here
    #[arg(long)]
    html: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    md_path: Option<String>,
    #[arg(long, help = "Export a bundled set of outputs to this directory")]
    export_dir: Option<String>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long, default_value_t = false)]
    no_emoji: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, default_value_t = false)]
    no_open: bool,
    #[arg(long, default_value_t = false)]
    no_header: bool,
    #[arg(long, default_value_t = false)]
    no_truncate: bool,
    #[arg(long)]
    msg_width: Option<usize>,
    /// Exit non-zero when any document in the run failed extraction
    #[arg(long, default_value_t = false)]
    strict: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            scan_path: None,
            file_glob: None,
            recursive: false,
            patterns: vec![],
            top: 50,
            output: OutputFmt::Text,
            text_format: TextFormat::Lines,
            theme: Theme::Dark,
            sort_by: SortBy::Time,
            sort_order: SortOrder::Asc,
            xsl: None,
            freb_html: None,
            html: None,
            csv_path: None,
            json_path: None,
            md_path: None,
            export_dir: None,
            no_color: false,
            force_color: false,
            no_emoji: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            progress: false,
            no_open: false,
            no_header: false,
            no_truncate: false,
            msg_width: None,
            strict: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

#[derive(Deserialize)]
struct AppConfig {
    scan_path: Option<String>,
    file_glob: Option<String>,
    recursive: Option<bool>,
    patterns: Option<Vec<String>>,
    top: Option<usize>,
    output: Option<OutputFmt>,
    text_format: Option<TextFormat>,
    theme: Option<Theme>,
    sort_by: Option<SortBy>,
    sort_order: Option<SortOrder>,
    xsl: Option<String>,
    freb_html: Option<String>,
    html: Option<String>,
    csv_path: Option<String>,
    json_path: Option<String>,
    md_path: Option<String>,
    export_dir: Option<String>,
    no_emoji: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
    progress: Option<bool>,
    no_open: Option<bool>,
    strict: Option<bool>,
    msg_width: Option<usize>,
}

#[derive(Serialize)]
struct ReportDoc<'a> {
    source: &'a str,
    summary: &'a RequestSummary,
    timeline: &'a [TraceEvent],
    advisories: &'a [Advisory],
    insights: &'a [String],
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "FrebDoctor", &mut f); } else { clap_complete::generate(sh, &mut cmd, "FrebDoctor", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "FrebDoctor", &mut std::io::stdout());
        }
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "FrebDoctor.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if args.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if let Some(lvl) = args.log_level {
            let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
            builder.filter_level(f);
        } else if args.verbose > 0 {
            let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            builder.filter_level(f);
        }
        if let Some(fmt) = args.log_format {
            match fmt {
                LogFormat::Json => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().to_rfc3339();
                        let obj = serde_json::json!({
                            "ts": ts,
                            "level": record.level().to_string(),
                            "target": record.target(),
                            "msg": record.args().to_string(),
                        });
                        writeln!(buf, "{}", obj)
                    });
                }
                LogFormat::Text => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().format("%H:%M:%S");
                        writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                    });
                }
            }
        }
        if let Some(path) = args.log_path.as_ref() {
            match std::fs::File::create(path) {
                Ok(f) => {
                    builder.target(env_logger::Target::Pipe(Box::new(f)));
                }
                Err(e) => {
                    eprintln!("Failed to open log file {}: {}", path, e);
                }
            }
        }
        builder.init();
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);
    if args.scan_path.is_some() {
        run_batch(&args);
    } else if args.input.is_some() {
        run_single(&args);
    } else {
        let _ = Args::command().print_help();
        std::process::exit(2);
    }
}

fn run_single(args: &Args) {
    let input = args.input.as_deref().unwrap_or_default();
    let bytes = match std::fs::read(input) {
        Ok(b) => b,
        Err(e) => { log::error!("Read failed for {}: {}", input, e); std::process::exit(1); }
    };
    let rep = match extract::analyze(&bytes) {
        Ok(r) => r,
        Err(e) => { log::error!("Cannot analyze {}: {}", input, e); std::process::exit(1); }
    };
    for a in &rep.advisories { log::warn!("{}: {}", input, a.message()); }

    // Export contract: the full timeline, always time-ascending.
    let mut sorted = rep.timeline.clone();
    extract::sort_timeline(&mut sorted);
    let insight_lines = insights::generate_insights(&rep.summary, &sorted, &rep.advisories);

    let compiled: Vec<Regex> = args.patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
    let mut display = filter_events(&rep.timeline, &compiled);
    sort_events(&mut display, args.sort_by, args.sort_order);

    match args.output {
        OutputFmt::Text => {
            match args.text_format {
                TextFormat::Lines => print_text(&rep.summary, &display, &insight_lines, &rep.advisories, args),
                TextFormat::Table => print_text_table(&rep.summary, &display, &insight_lines, &rep.advisories, args),
            }
        }
        OutputFmt::Json => {
            let doc = ReportDoc { source: input, summary: &rep.summary, timeline: &sorted, advisories: &rep.advisories, insights: &insight_lines };
            if let Some(p) = args.json_path.as_ref() {
                match std::fs::write(p, serde_json::to_vec_pretty(&doc).unwrap()) {
                    Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
                    Err(e) => log::error!("JSON write failed for {}: {}", p, e),
                }
            } else if !args.quiet { println!("{}", serde_json::to_string_pretty(&doc).unwrap()); }
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = write_csv(p, &sorted) { log::error!("CSV write failed for {}: {}", p, e); } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); }
    }
    if let Some(p) = args.md_path.as_ref() {
        let md = markdown::render_markdown(&rep.summary, &sorted, &insight_lines, &rep.advisories);
        match std::fs::write(p, md) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", p), "1;36")); } }
            Err(e) => { log::error!("Markdown write failed for {}: {}", p, e); }
        }
    }
    if let Some(p) = args.html.as_ref() {
        let page = html::render_html(&rep.summary, &sorted, &insight_lines, &rep.advisories, args.theme);
        match std::fs::write(p, page) {
            Ok(_) => {
                if !args.no_open { open_file_default(PathBuf::from(p)); }
                if !args.quiet { println!("{}", paint(&format!("HTML generated: {}", p), "1;36")); }
            }
            Err(e) => { log::error!("HTML write failed for {}: {}", p, e); }
        }
    }
    if let Some(p) = args.freb_html.as_ref() {
        render_freb_html(args, Path::new(input), p);
    }
    if let Some(dir) = args.export_dir.as_ref() {
        let _ = std::fs::create_dir_all(dir);
        let ts = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let base = PathBuf::from(dir);
        let html_path = base.join(format!("report-{}.html", ts));
        let page = html::render_html(&rep.summary, &sorted, &insight_lines, &rep.advisories, args.theme);
        match std::fs::write(&html_path, page) {
            Ok(_) => { if !args.no_open { open_file_default(html_path.clone()); } if !args.quiet { println!("{}", paint(&format!("HTML generated: {}", html_path.to_string_lossy()), "1;36")); } }
            Err(e) => { log::error!("HTML write failed for {}: {}", html_path.to_string_lossy(), e); }
        }
        let json_path = base.join(format!("report-{}.json", ts));
        let doc = ReportDoc { source: input, summary: &rep.summary, timeline: &sorted, advisories: &rep.advisories, insights: &insight_lines };
        match std::fs::write(&json_path, serde_json::to_vec_pretty(&doc).unwrap()) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", json_path.to_string_lossy()), "1;36")); } }
            Err(e) => log::error!("JSON write failed for {}: {}", json_path.to_string_lossy(), e),
        }
        let csv_path = base.join(format!("timeline-{}.csv", ts));
        if let Err(e) = write_csv(&csv_path.to_string_lossy(), &sorted) { log::error!("CSV write failed for {}: {}", csv_path.to_string_lossy(), e); } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", csv_path.to_string_lossy()), "1;36")); }
        let md_path = base.join(format!("report-{}.md", ts));
        let md = markdown::render_markdown(&rep.summary, &sorted, &insight_lines, &rep.advisories);
        match std::fs::write(&md_path, md) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", md_path.to_string_lossy()), "1;36")); } }
            Err(e) => { log::error!("Markdown write failed for {}: {}", md_path.to_string_lossy(), e); }
        }
    }
}

fn render_freb_html(args: &Args, input: &Path, out_path: &str) {
    let input_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let xsl = match stylesheet::locate_stylesheet(args.xsl.as_deref().map(Path::new), input_dir) {
        Some(p) => p,
        None => {
            log::warn!("freb.xsl not found; proceeding with schema extraction only.");
            return;
        }
    };
    match stylesheet::transform(input, &xsl) {
        Ok(page) => match std::fs::write(out_path, page) {
            Ok(_) => {
                if !args.no_open { open_file_default(PathBuf::from(out_path)); }
                if !args.quiet { println!("{}", paint(&format!("FREB HTML generated: {}", out_path), "1;36")); }
            }
            Err(e) => log::error!("FREB HTML write failed for {}: {}", out_path, e),
        },
        Err(e) => log::error!("Transformation failed for {}: {}", input.to_string_lossy(), e),
    }
}

fn run_batch(args: &Args) {
    let root = args.scan_path.as_deref().unwrap_or_default();
    let digests = scan::scan(root, args.file_glob.as_deref(), args.recursive, args.progress);
    let failed = digests.iter().filter(|d| d.error.is_some()).count();
    match args.output {
        OutputFmt::Json => {
            if let Some(p) = args.json_path.as_ref() {
                match std::fs::write(p, serde_json::to_vec_pretty(&digests).unwrap()) {
                    Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
                    Err(e) => log::error!("JSON write failed for {}: {}", p, e),
                }
            } else if !args.quiet { println!("{}", serde_json::to_string_pretty(&digests).unwrap()); }
        }
        OutputFmt::Text => {
            if !args.no_header { println!("{}", paint(&format!("Analyzed {} trace(s) under {}", digests.len(), root), "1;36")); }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![paint("File", "1"), paint("URL", "1"), paint("Status", "1"), paint("Time (ms)", "1"), paint("Events", "1"), paint("Root Cause", "1")]);
            for d in &digests {
                let cause = match d.error.as_ref() {
                    Some(e) => paint(&format!("error: {}", truncate(e, 48)), "31"),
                    None => d.root_cause.clone(),
                };
                table.add_row(vec![d.path.clone(), truncate(&d.url, 48), d.status.clone(), d.time_taken.clone(), d.events.to_string(), cause]);
            }
            println!("{}", table);
            if failed > 0 { println!("{}", paint(&format!("{} trace(s) failed extraction", failed), "1;33")); }
        }
    }
    if args.strict && failed > 0 { std::process::exit(1); }
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.scan_path.is_none() && let Some(v) = cfg.scan_path { args.scan_path = Some(v); }
    if args.file_glob.is_none() && let Some(v) = cfg.file_glob { args.file_glob = Some(v); }
    if let Some(v) = cfg.recursive { args.recursive = v; }
    if args.patterns.is_empty() && let Some(v) = cfg.patterns { args.patterns = v; }
    if args.top == 50 && let Some(v) = cfg.top { args.top = v; }
    if let Some(v) = cfg.output { args.output = v; }
    if let Some(v) = cfg.text_format { args.text_format = v; }
    if let Some(v) = cfg.theme { args.theme = v; }
    if let Some(v) = cfg.sort_by { args.sort_by = v; }
    if let Some(v) = cfg.sort_order { args.sort_order = v; }
    if args.xsl.is_none() && let Some(v) = cfg.xsl { args.xsl = Some(v); }
    if args.freb_html.is_none() && let Some(v) = cfg.freb_html { args.freb_html = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.export_dir.is_none() && let Some(v) = cfg.export_dir { args.export_dir = Some(v); }
    if let Some(v) = cfg.no_emoji { args.no_emoji = v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
    if let Some(v) = cfg.progress { args.progress = v; }
    if let Some(v) = cfg.no_open { args.no_open = v; }
    if let Some(v) = cfg.strict { args.strict = v; }
    if args.msg_width.is_none() && let Some(v) = cfg.msg_width { args.msg_width = Some(v); }
}

fn filter_events(events: &[TraceEvent], patterns: &[Regex]) -> Vec<TraceEvent> {
    if patterns.is_empty() { return events.to_vec(); }
    events.iter()
        .filter(|e| patterns.iter().any(|re| re.is_match(&e.event_name) || re.is_match(&e.provider) || re.is_match(&e.reason)))
        .cloned()
        .collect()
}

fn sort_events(events: &mut [TraceEvent], by: SortBy, order: SortOrder) {
    match (by, order) {
        (SortBy::Time, SortOrder::Asc) => events.sort_by_key(|e| e.time_ms),
        (SortBy::Time, SortOrder::Desc) => events.sort_by(|a, b| b.time_ms.cmp(&a.time_ms)),
        (SortBy::Name, SortOrder::Asc) => events.sort_by(|a, b| a.event_name.cmp(&b.event_name)),
        (SortBy::Name, SortOrder::Desc) => events.sort_by(|a, b| b.event_name.cmp(&a.event_name)),
        (SortBy::Provider, SortOrder::Asc) => events.sort_by(|a, b| a.provider.cmp(&b.provider)),
        (SortBy::Provider, SortOrder::Desc) => events.sort_by(|a, b| b.provider.cmp(&a.provider)),
    }
}

fn status_display(s: &RequestSummary) -> String {
    format!("{}.{}", s.status_code, s.sub_status_code)
}

fn print_summary(summary: &RequestSummary, insight_lines: &[String], advisories: &[Advisory], args: &Args) {
    let emoji = !args.no_emoji;
    if !args.no_header { println!("{}", paint("Request Summary:", "1;36")); }
    println!("{} {}", paint("URL:", "1"), summary.url);
    println!("{} {}", paint("Status Code:", "1"), status_display(summary));
    println!("{} {} ms", paint("Time Taken:", "1"), summary.time_taken);
    let cause_code = match summary.status_code.as_str() { "404" | "500" => "1;31", _ => "1" };
    let cause = if emoji && summary.root_cause != "Unknown" { format!("⚠️ {}", summary.root_cause) } else { summary.root_cause.clone() };
    println!("{} {}", paint("Root Cause:", "1"), paint(&cause, cause_code));
    println!("{} {}", paint("Site:", "1"), summary.site_id);
    println!("{} {}", paint("Process:", "1"), summary.process_id);
    println!("{} {}", paint("App Pool:", "1"), summary.app_pool_id);
    println!("{} {}", paint("Authentication:", "1"), summary.authentication);
    println!("{} {}", paint("User:", "1"), summary.user_name);
    println!("{} {}", paint("Activity ID:", "1"), summary.activity_id);
    println!("{} {}", paint("Verb:", "1"), summary.verb);
    if !insight_lines.is_empty() {
        println!("{}", paint("Insights:", "1"));
        for i in insight_lines { println!("- {}", i); }
    }
    if !advisories.is_empty() {
        println!("{}", paint("Advisories:", "1;33"));
        for a in advisories { println!("{} {}", if emoji { "⚠️" } else { "-" }, a.message()); }
    }
}

fn print_text(summary: &RequestSummary, timeline: &[TraceEvent], insight_lines: &[String], advisories: &[Advisory], args: &Args) {
    print_summary(summary, insight_lines, advisories, args);
    if !args.no_header { println!("{}", paint("Event Timeline:", "1;36")); }
    if timeline.is_empty() {
        println!("{}", paint("No events found in the trace.", "2"));
        return;
    }
    let mw = args.msg_width.unwrap_or(48);
    if !args.no_header {
        println!("{}", paint(&format!("{:<10} {:<40} {:<24} {:<mw$}", "Time (ms)", "Event Name", "Provider", "Reason", mw = mw), "1"));
    }
    for e in timeline.iter().take(args.top) {
        let name = if args.no_truncate { e.event_name.clone() } else { truncate(&e.event_name, 40) };
        let prov = if args.no_truncate { e.provider.clone() } else { truncate(&e.provider, 24) };
        let reason = if args.no_truncate { e.reason.replace('\n', " ") } else { truncate(&e.reason.replace('\n', " "), mw) };
        println!("{:<10} {:<40} {:<24} {:<mw$}", e.time_ms, name, prov, reason, mw = mw);
    }
    if timeline.len() > args.top {
        println!("{}", paint(&format!("(showing {} of {} events)", args.top, timeline.len()), "2"));
    }
}

fn print_text_table(summary: &RequestSummary, timeline: &[TraceEvent], insight_lines: &[String], advisories: &[Advisory], args: &Args) {
    print_summary(summary, insight_lines, advisories, args);
    if timeline.is_empty() {
        println!("{}", paint("No events found in the trace.", "2"));
        return;
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![paint("Time (ms)", "1"), paint("Event Name", "1"), paint("Provider", "1"), paint("Reason", "1")]);
    for e in timeline.iter().take(args.top) {
        let reason = if args.no_truncate { e.reason.clone() } else { truncate(&e.reason, args.msg_width.unwrap_or(48)) };
        table.add_row(vec![e.time_ms.to_string(), e.event_name.clone(), e.provider.clone(), reason]);
    }
    println!("{}", table);
    if timeline.len() > args.top {
        println!("{}", paint(&format!("(showing {} of {} events)", args.top, timeline.len()), "2"));
    }
}

fn write_csv(path: &str, timeline: &[TraceEvent]) -> anyhow::Result<()> {
    let bytes = extract::timeline_csv(timeline)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn truncate(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().count() > n { out.push_str("..."); }
    out
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(target_os = "windows")]
fn open_file_default(p: PathBuf) {
    let mut s = p.to_string_lossy().into_owned();
    if s.starts_with("\\\\?\\") { s = s.trim_start_matches("\\\\?\\").to_string(); }
    if s.ends_with('\\') || s.ends_with('/') { s = s.trim_end_matches(['\\', '/']).to_string(); }
    let _ = std::process::Command::new("explorer").arg(&s).spawn()
        .or_else(|_| std::process::Command::new("cmd").args(["/C", "start", "", &s]).spawn())
        .map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(not(target_os = "windows"))]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("xdg-open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(test)]
mod tests_filter {
    use super::*;

    fn ev(name: &str, provider: &str, reason: &str) -> TraceEvent {
        TraceEvent { sequence_index: 0, time_ms: 0, event_name: name.to_string(), provider: provider.to_string(), reason: reason.to_string() }
    }

    #[test]
    fn empty_patterns_keep_everything() {
        let events = vec![ev("A", "", ""), ev("B", "", "")];
        assert_eq!(filter_events(&events, &[]).len(), 2);
    }

    #[test]
    fn patterns_match_any_field() {
        let events = vec![ev("GENERAL_REQUEST_START", "WWW Server", ""), ev("AUTH_START", "Authentication", ""), ev("END", "", "STATUS_CODE")];
        let res = filter_events(&events, &[Regex::new("(?i)auth").unwrap()]);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].event_name, "AUTH_START");
        let res = filter_events(&events, &[Regex::new("STATUS_CODE").unwrap()]);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].event_name, "END");
    }
}

#[cfg(test)]
mod tests_sort {
    use super::*;

    fn ev(i: usize, ms: i64, name: &str) -> TraceEvent {
        TraceEvent { sequence_index: i, time_ms: ms, event_name: name.to_string(), provider: String::new(), reason: String::new() }
    }

    #[test]
    fn time_desc_reverses() {
        let mut events = vec![ev(0, 5, "A"), ev(1, 9, "B"), ev(2, 1, "C")];
        sort_events(&mut events, SortBy::Time, SortOrder::Desc);
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn time_asc_is_stable_on_ties() {
        let mut events = vec![ev(0, 5, "first"), ev(1, 5, "second"), ev(2, 1, "third")];
        sort_events(&mut events, SortBy::Time, SortOrder::Asc);
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["third", "first", "second"]);
    }

    #[test]
    fn name_sort_orders_lexically() {
        let mut events = vec![ev(0, 0, "B"), ev(1, 0, "A")];
        sort_events(&mut events, SortBy::Name, SortOrder::Asc);
        assert_eq!(events[0].event_name, "A");
    }
}

#[cfg(test)]
mod tests_config {
    use super::*;

    fn cfg_from(s: &str) -> AppConfig {
        toml::from_str::<AppConfig>(s).unwrap()
    }

    #[test]
    fn config_fills_unset_values() {
        let mut args = Args::default();
        apply_config(&mut args, cfg_from("csv_path = \"out.csv\"\ntop = 10\nstrict = true\n"));
        assert_eq!(args.csv_path.as_deref(), Some("out.csv"));
        assert_eq!(args.top, 10);
        assert!(args.strict);
    }

    #[test]
    fn cli_values_win_over_config() {
        let mut args = Args { csv_path: Some("cli.csv".to_string()), top: 7, ..Default::default() };
        apply_config(&mut args, cfg_from("csv_path = \"cfg.csv\"\ntop = 10\n"));
        assert_eq!(args.csv_path.as_deref(), Some("cli.csv"));
        assert_eq!(args.top, 7);
    }

    #[test]
    fn enum_values_parse_from_toml() {
        let mut args = Args::default();
        apply_config(&mut args, cfg_from("output = \"json\"\nsort_order = \"desc\"\n"));
        assert!(matches!(args.output, OutputFmt::Json));
        assert!(matches!(args.sort_order, SortOrder::Desc));
    }
}
