//! Namespace-resolving XML element tree and the XCCDF accessor over it.
//!
//! Documents are read with `quick_xml::NsReader` into a small owned tree where
//! each element keeps its resolved namespace URI and local name. `Xccdf` then
//! answers lookups by local name against whichever XCCDF namespace the
//! document was found to use, so parsers never branch on schema version.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::errors::ConvertError;
use crate::models::XccdfNamespace;

/// Deepest element nesting accepted before a document is rejected.
pub const MAX_ELEMENT_DEPTH: usize = 1024;

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    /// Attributes by local name, in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated, trimmed character data directly inside this element.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Pre-order iterator over all descendants (excluding `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct Descendants<'e> {
    stack: Vec<&'e XmlElement>,
}

impl<'e> Iterator for Descendants<'e> {
    type Item = &'e XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(name: &str, data: &[u8]) -> Result<XmlElement, ConvertError> {
    let mut reader = NsReader::from_reader(data);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ConvertError::malformed(name, e))?;
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            _ => None,
        };

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ConvertError::malformed(name, "content after root element"));
                }
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(ConvertError::malformed(
                        name,
                        format!("element nesting exceeds {MAX_ELEMENT_DEPTH}"),
                    ));
                }
                let mut element = XmlElement {
                    namespace,
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| ConvertError::malformed(name, e))?;
                    // Namespace declarations are not data.
                    let key = attr.key;
                    if key.as_ref() == b"xmlns" || key.prefix().is_some_and(|p| p.as_ref() == b"xmlns") {
                        continue;
                    }
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .map_err(|e| ConvertError::malformed(name, e))?;
                    element.attributes.push((
                        String::from_utf8_lossy(key.local_name().as_ref()).into_owned(),
                        value.into_owned(),
                    ));
                }
                stack.push(element);
            }
            Event::End(_) => {
                let Some(mut element) = stack.pop() else {
                    return Err(ConvertError::malformed(name, "unbalanced end tag"));
                };
                let trimmed = element.text.trim();
                if trimmed.len() != element.text.len() {
                    element.text = trimmed.to_string();
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = text.decode().map_err(|e| ConvertError::malformed(name, e))?;
                    current.text.push_str(&decoded);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = cdata.decode().map_err(|e| ConvertError::malformed(name, e))?;
                    current.text.push_str(&decoded);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(current) = stack.last_mut() {
                    if let Some(ch) = reference
                        .resolve_char_ref()
                        .map_err(|e| ConvertError::malformed(name, e))?
                    {
                        current.text.push(ch);
                    } else {
                        let entity = reference.decode().map_err(|e| ConvertError::malformed(name, e))?;
                        match quick_xml::escape::resolve_predefined_entity(&entity) {
                            Some(resolved) => current.text.push_str(resolved),
                            None => {
                                return Err(ConvertError::malformed(
                                    name,
                                    format!("unknown entity &{entity};"),
                                ))
                            }
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ConvertError::malformed(name, "unexpected end of document"));
    }
    root.ok_or_else(|| ConvertError::malformed(name, "document has no root element"))
}

/// Namespace-agnostic accessor for XCCDF elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xccdf {
    namespace: XccdfNamespace,
}

impl Xccdf {
    /// Resolve the variant from the first element bound to a known XCCDF namespace.
    pub fn detect(root: &XmlElement) -> Self {
        let namespace = std::iter::once(root)
            .chain(root.descendants())
            .find_map(|el| el.namespace.as_deref().and_then(XccdfNamespace::from_uri))
            .unwrap_or(XccdfNamespace::Unqualified);
        Self { namespace }
    }

    /// Accessor for the namespace `element` itself is bound to.
    pub fn of(element: &XmlElement) -> Self {
        let namespace = element
            .namespace
            .as_deref()
            .and_then(XccdfNamespace::from_uri)
            .unwrap_or(XccdfNamespace::Unqualified);
        Self { namespace }
    }

    pub fn namespace(&self) -> XccdfNamespace {
        self.namespace
    }

    pub fn is(&self, element: &XmlElement, local: &str) -> bool {
        element.name == local && element.namespace.as_deref() == self.namespace.uri()
    }

    pub fn child<'e>(&self, element: &'e XmlElement, local: &str) -> Option<&'e XmlElement> {
        element.children.iter().find(|c| self.is(c, local))
    }

    pub fn children<'e>(
        &self,
        element: &'e XmlElement,
        local: &'e str,
    ) -> impl Iterator<Item = &'e XmlElement> + 'e {
        let xccdf = *self;
        element.children.iter().filter(move |c| xccdf.is(c, local))
    }

    /// First match among `element` itself and its descendants, in document order.
    pub fn find<'e>(&self, element: &'e XmlElement, local: &str) -> Option<&'e XmlElement> {
        std::iter::once(element)
            .chain(element.descendants())
            .find(|el| self.is(el, local))
    }

    /// All matching descendants in document order.
    pub fn find_all<'e>(
        &self,
        element: &'e XmlElement,
        local: &'e str,
    ) -> impl Iterator<Item = &'e XmlElement> + 'e {
        let xccdf = *self;
        element.descendants().filter(move |el| xccdf.is(el, local))
    }

    /// Trimmed text of the first matching child, if present and non-empty.
    pub fn child_text<'e>(&self, element: &'e XmlElement, local: &str) -> Option<&'e str> {
        self.child(element, local)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_12: &[u8] = br#"<?xml version="1.0"?>
<cdf:Benchmark xmlns:cdf="http://checklists.nist.gov/xccdf/1.2" id="b1">
  <cdf:title>Demo &amp; Test</cdf:title>
  <cdf:Rule id="r1"><cdf:title>  Rule &#x31; </cdf:title></cdf:Rule>
  <other:note xmlns:other="urn:other">ignored</other:note>
  <cdf:Rule id="r2"/>
</cdf:Benchmark>"#;

    const DOC_11_DEFAULT_NS: &[u8] = br#"<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.1" id="b2">
  <Group id="g1"><Rule id="r1"><title><![CDATA[a < b]]></title></Rule></Group>
</Benchmark>"#;

    #[test]
    fn parses_tree_with_prefixed_namespace() {
        let root = parse_document("doc", DOC_12).unwrap();
        assert_eq!(root.name, "Benchmark");
        assert_eq!(root.namespace.as_deref(), Some(crate::models::XCCDF_1_2_NS));
        assert_eq!(root.attr("id"), Some("b1"));
        assert_eq!(root.children.len(), 4);
    }

    #[test]
    fn resolves_entities_and_trims_text() {
        let root = parse_document("doc", DOC_12).unwrap();
        let xccdf = Xccdf::detect(&root);
        assert_eq!(xccdf.child_text(&root, "title"), Some("Demo & Test"));
        let rule = xccdf.child(&root, "Rule").unwrap();
        assert_eq!(xccdf.child_text(rule, "title"), Some("Rule 1"));
    }

    #[test]
    fn detects_both_namespace_versions() {
        let root = parse_document("a", DOC_12).unwrap();
        assert_eq!(Xccdf::detect(&root).namespace(), XccdfNamespace::V1_2);
        let root = parse_document("b", DOC_11_DEFAULT_NS).unwrap();
        assert_eq!(Xccdf::detect(&root).namespace(), XccdfNamespace::V1_1);
    }

    #[test]
    fn foreign_namespace_elements_do_not_match() {
        let root = parse_document("doc", DOC_12).unwrap();
        let xccdf = Xccdf::detect(&root);
        assert!(xccdf.child(&root, "note").is_none());
        assert_eq!(xccdf.children(&root, "Rule").count(), 2);
    }

    #[test]
    fn find_all_walks_nested_groups_in_order() {
        let root = parse_document("doc", DOC_11_DEFAULT_NS).unwrap();
        let xccdf = Xccdf::detect(&root);
        let ids: Vec<_> = xccdf.find_all(&root, "Rule").filter_map(|r| r.attr("id")).collect();
        assert_eq!(ids, vec!["r1"]);
        let rule = xccdf.find(&root, "Rule").unwrap();
        assert_eq!(xccdf.child_text(rule, "title"), Some("a < b"));
    }

    #[test]
    fn unqualified_documents_fall_back() {
        let root = parse_document("doc", b"<TestResult><target>h</target></TestResult>").unwrap();
        let xccdf = Xccdf::detect(&root);
        assert_eq!(xccdf.namespace(), XccdfNamespace::Unqualified);
        assert_eq!(xccdf.child_text(&root, "target"), Some("h"));
    }

    #[test]
    fn rejects_truncated_document() {
        let err = parse_document("bad.xml", b"<Benchmark><Rule>").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    fn nested(depth: usize) -> Vec<u8> {
        let mut doc = "<x>".repeat(depth);
        doc.push_str(&"</x>".repeat(depth));
        doc.into_bytes()
    }

    #[test]
    fn accepts_nesting_up_to_the_cap() {
        let root = parse_document("deep.xml", &nested(MAX_ELEMENT_DEPTH)).unwrap();
        assert_eq!(root.descendants().count(), MAX_ELEMENT_DEPTH - 1);
    }

    #[test]
    fn rejects_nesting_beyond_the_cap() {
        let err = parse_document("deep.xml", &nested(MAX_ELEMENT_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
        assert!(err.to_string().contains("element nesting exceeds"));
    }

    #[test]
    fn very_deep_document_fails_cleanly() {
        let err = parse_document("hostile.xml", &nested(200_000)).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedDocument { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_document("empty.xml", b"").is_err());
    }
}
