use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use thiserror::Error;

/// Namespace IIS stamps on failed-request trace documents. Some producers
/// omit it, so lookups fall back to the bare element name.
pub const TRACE_NS: &str = "http://schemas.microsoft.com/win/2004/08/events/trace";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("document ended before the root element was closed")]
    Truncated,
}

#[derive(Clone, Debug, Default)]
pub struct Element {
    pub ns: Option<String>,
    pub local: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn is(&self, local: &str, ns: Option<&str>) -> bool {
        self.local == local && self.ns.as_deref() == ns
    }

    /// First child with the given local name: the namespace-qualified form is
    /// tried first, then the bare (no-namespace) form.
    pub fn find_child(&self, local: &str, ns: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(local, Some(ns)))
            .or_else(|| self.children.iter().find(|c| c.is(local, None)))
    }

    /// Document-order descendants with the given local name. Qualified matches
    /// take precedence: the bare form is consulted only when zero qualified
    /// matches exist, never as a union.
    pub fn descendants(&self, local: &str, ns: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect(local, Some(ns), &mut out);
        if out.is_empty() { self.collect(local, None, &mut out); }
        out
    }

    /// Document-order descendants matching either the qualified or the bare
    /// form of the name.
    pub fn descendants_any_form(&self, local: &str, ns: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_any(local, ns, &mut out);
        out
    }

    fn collect<'a>(&'a self, local: &str, ns: Option<&str>, out: &mut Vec<&'a Element>) {
        for c in &self.children {
            if c.is(local, ns) { out.push(c); }
            c.collect(local, ns, out);
        }
    }

    fn collect_any<'a>(&'a self, local: &str, ns: &str, out: &mut Vec<&'a Element>) {
        for c in &self.children {
            if c.local == local && (c.ns.is_none() || c.ns.as_deref() == Some(ns)) { out.push(c); }
            c.collect_any(local, ns, out);
        }
    }

    /// ElementTree-style display form: `{namespace}local` when namespaced.
    pub fn display_name(&self) -> String {
        match self.ns.as_ref() {
            Some(u) => format!("{{{}}}{}", u, self.local),
            None => self.local.clone(),
        }
    }
}

fn open_element(res: ResolveResult, e: &BytesStart) -> Element {
    let ns = match res {
        ResolveResult::Bound(n) => Some(String::from_utf8_lossy(n.0).into_owned()),
        _ => None,
    };
    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in e.attributes().flatten() {
        let k = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
        if let Ok(v) = a.unescape_value() { attrs.push((k, v.into_owned())); }
    }
    Element { ns, local, attrs, text: String::new(), children: Vec::new() }
}

fn close_element(el: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => { if root.is_none() { *root = Some(el); } }
    }
}

/// Builds an element tree from raw document bytes. Ill-formed input surfaces
/// the underlying reader error rather than a partial tree.
pub fn parse(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_resolved_event_into(&mut buf)? {
            (res, XmlEvent::Start(e)) => {
                stack.push(open_element(res, &e));
            }
            (res, XmlEvent::Empty(e)) => {
                close_element(open_element(res, &e), &mut stack, &mut root);
            }
            (_, XmlEvent::End(_)) => {
                if let Some(el) = stack.pop() { close_element(el, &mut stack, &mut root); }
            }
            (_, XmlEvent::Text(t)) => {
                if let Some(cur) = stack.last_mut() {
                    let v = t.unescape()?;
                    cur.text.push_str(v.trim());
                }
            }
            (_, XmlEvent::CData(t)) => {
                if let Some(cur) = stack.last_mut() {
                    cur.text.push_str(String::from_utf8_lossy(t.as_ref()).trim());
                }
            }
            (_, XmlEvent::Eof) => break,
            _ => {}
        }
        buf.clear();
    }
    if !stack.is_empty() { return Err(XmlError::Truncated); }
    root.ok_or(XmlError::NoRoot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_tree() {
        let xml = "<failedRequest xmlns=\"http://schemas.microsoft.com/win/2004/08/events/trace\" url=\"http://x/\"><event time=\"5\"><name>A</name></event></failedRequest>";
        let root = parse(xml.as_bytes()).unwrap();
        assert_eq!(root.local, "failedRequest");
        assert_eq!(root.ns.as_deref(), Some(TRACE_NS));
        assert_eq!(root.attr("url").unwrap(), "http://x/");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].children[0].text, "A");
    }

    #[test]
    fn attribute_values_are_unescaped() {
        let root = parse(b"<failedRequest url=\"http://x/?a=1&amp;b=2\"/>").unwrap();
        assert_eq!(root.attr("url").unwrap(), "http://x/?a=1&b=2");
    }

    #[test]
    fn find_child_prefers_qualified_form() {
        let xml = "<r xmlns:t=\"http://schemas.microsoft.com/win/2004/08/events/trace\"><name>bare</name><t:name>qualified</t:name></r>";
        let root = parse(xml.as_bytes()).unwrap();
        assert_eq!(root.find_child("name", TRACE_NS).unwrap().text, "qualified");
    }

    #[test]
    fn find_child_falls_back_to_bare_form() {
        let root = parse(b"<r><name>bare</name></r>").unwrap();
        assert_eq!(root.find_child("name", TRACE_NS).unwrap().text, "bare");
    }

    #[test]
    fn descendants_ignores_bare_when_qualified_present() {
        let xml = "<r xmlns:t=\"http://schemas.microsoft.com/win/2004/08/events/trace\"><t:event/><event/><sub><t:event/></sub></r>";
        let root = parse(xml.as_bytes()).unwrap();
        assert_eq!(root.descendants("event", TRACE_NS).len(), 2);
    }

    #[test]
    fn descendants_any_form_is_a_union() {
        let xml = "<r xmlns:t=\"http://schemas.microsoft.com/win/2004/08/events/trace\"><t:data/><data/></r>";
        let root = parse(xml.as_bytes()).unwrap();
        assert_eq!(root.descendants_any_form("data", TRACE_NS).len(), 2);
    }

    #[test]
    fn foreign_namespace_is_not_bare() {
        let xml = "<r xmlns:o=\"urn:other\"><o:name>foreign</o:name></r>";
        let root = parse(xml.as_bytes()).unwrap();
        assert!(root.find_child("name", TRACE_NS).is_none());
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(matches!(parse(b"<a><b></a>"), Err(XmlError::Syntax(_))));
        assert!(matches!(parse(b"no markup at all"), Err(XmlError::NoRoot)));
    }

    #[test]
    fn display_name_matches_elementtree_form() {
        let root = parse(b"<wrongRoot xmlns=\"urn:x\"/>").unwrap();
        assert_eq!(root.display_name(), "{urn:x}wrongRoot");
        let bare = parse(b"<wrongRoot/>").unwrap();
        assert_eq!(bare.display_name(), "wrongRoot");
    }
}
