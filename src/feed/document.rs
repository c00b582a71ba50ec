use std::io::Cursor;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from a source feed.
/// RSS is shallow; anything deeper is malformed or hostile.
const MAX_DEPTH: usize = 256;

/// Errors that can occur while reading or writing a feed document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The underlying XML reader rejected the input.
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// The input contained no element at all.
    #[error("Document has no root element")]
    NoRoot,

    /// A second top-level element followed the root.
    #[error("Document has more than one root element (found <{0}>)")]
    MultipleRoots(String),

    /// An element was still open at end of input.
    #[error("Unclosed element <{0}> at end of document")]
    Unclosed(String),

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Element nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// Serialization failed.
    #[error("Failed to write XML: {0}")]
    Write(String),
}

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// A `<![CDATA[...]]>` section, kept as CDATA on output.
    CData(String),
    /// Raw comment content.
    Comment(String),
}

/// An XML element with its qualified name (`prefix:local` as written in the source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Builder-style text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing an existing value in place to keep attribute order.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Iterates over child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First child element with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.name == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Concatenated text and CDATA content of direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Mutable access to text and CDATA children, so content can be rewritten
    /// without changing how it is serialized.
    pub fn text_nodes_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Text(t) | Node::CData(t) => Some(t),
            _ => None,
        })
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Inserts `child` before the first child element named `anchor`,
    /// or appends it when there is none.
    pub fn insert_before(&mut self, anchor: &str, child: Element) {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(el) if el.name == anchor));
        match position {
            Some(idx) => self.children.insert(idx, Node::Element(child)),
            None => self.children.push(Node::Element(child)),
        }
    }
}

/// An owned feed document: the root element plus everything beneath it.
///
/// The XML declaration, doctype and processing instructions of the source are
/// not kept; [`Document::to_xml`] always writes a fresh UTF-8 declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parses a complete XML document.
    ///
    /// Whitespace-only text is dropped and surrounding whitespace trimmed, so
    /// serializing with indentation gives stable output across repeated runs.
    ///
    /// # Security
    ///
    /// SEC-002: `quick-xml` (0.37) does not expand `<!ENTITY>` declarations;
    /// unknown entities in text are a parse error.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(DocumentError::Parse {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })
                }
            };

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(DocumentError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    stack.push(element_from_start(&e, &reader)?);
                }
                Event::Empty(e) => {
                    let element = element_from_start(&e, &reader)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml checks that end names match, so the top of the stack is ours
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| DocumentError::Parse {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::CData(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }

        root.map(|root| Document { root }).ok_or(DocumentError::NoRoot)
    }

    /// Serializes the document with an XML declaration and two-space indentation.
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| DocumentError::Write(e.to_string()))?;

        write_element(&mut writer, &self.root)?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| DocumentError::Write(e.to_string()))
    }
}

fn element_from_start(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());

    for attr_result in e.attributes() {
        // Duplicate attributes surface here; namespace runs are de-duplicated before parsing
        let attr = attr_result.map_err(|err| DocumentError::Parse {
            position: reader.buffer_position() as u64,
            message: err.to_string(),
        })?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| DocumentError::Parse {
                position: reader.buffer_position() as u64,
                message: err.to_string(),
            })?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }

    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocumentError::MultipleRoots(element.name)),
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| DocumentError::Write(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| DocumentError::Write(e.to_string()))?;

    for child in &element.children {
        let event = match child {
            Node::Element(el) => {
                write_element(writer, el)?;
                continue;
            }
            // `]]>` cannot appear inside CDATA; fall back to escaped text
            Node::CData(text) if !text.contains("]]>") => {
                Event::CData(BytesCData::new(text.as_str()))
            }
            Node::Text(text) | Node::CData(text) => {
                Event::Text(BytesText::from_escaped(partial_escape(text.as_str())))
            }
            Node::Comment(text) => Event::Comment(BytesText::from_escaped(text.as_str())),
        };
        writer
            .write_event(event)
            .map_err(|e| DocumentError::Write(e.to_string()))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| DocumentError::Write(e.to_string()))
}
