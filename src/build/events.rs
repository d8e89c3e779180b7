//! Document-construction event vocabulary
//!
//! The inbound boundary is a SAX-shaped handler trait: the event source
//! calls [`ContentSink`] methods in a single well-nested pass. The same
//! trait is the outbound boundary for subtree replay, so anything that
//! can consume a parse can consume a replayed subtree.
//!
//! An owned [`Event`] mirror exists for sources that buffer events
//! (batching incremental sources, tests, recorded streams).

/// One attribute reported with a start-element event.
#[derive(Debug, Clone, Copy)]
pub struct Attr<'a> {
    /// Namespace URI, "" for none.
    pub uri: &'a str,
    /// Local name.
    pub local: &'a str,
    /// Qualified name as written, prefix included.
    pub qname: &'a str,
    /// Attribute value.
    pub value: &'a str,
    /// True when the attribute's declared type is ID.
    pub is_id: bool,
}

/// SAX-style receiver for document-construction notifications.
///
/// The stream is assumed well-nested and single-pass. DTD-bracketed
/// events, skipped entities, and entity/notation declarations have
/// empty default implementations since most consumers ignore them.
pub trait ContentSink {
    /// Document open.
    fn start_document(&mut self);
    /// Document close.
    fn end_document(&mut self);

    /// A prefix binding entering scope, before the owning start-element.
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        let _ = (prefix, uri);
    }
    /// A prefix binding leaving scope, after the owning end-element.
    fn end_prefix_mapping(&mut self, prefix: &str) {
        let _ = prefix;
    }

    /// Element open, with its attributes.
    fn start_element(&mut self, uri: &str, local: &str, qname: &str, attrs: &[Attr<'_>]);
    /// Element close.
    fn end_element(&mut self, uri: &str, local: &str, qname: &str);

    /// Character content. Adjacent calls coalesce into one text node.
    fn characters(&mut self, text: &str);
    /// Whitespace a validating parser knows is ignorable; treated as
    /// ordinary character content.
    fn ignorable_whitespace(&mut self, text: &str) {
        self.characters(text);
    }

    /// Comment body.
    fn comment(&mut self, text: &str);
    /// Processing instruction.
    fn processing_instruction(&mut self, target: &str, data: &str);

    /// CDATA section opens; following characters are CDATA content.
    fn start_cdata(&mut self) {}
    /// CDATA section closes.
    fn end_cdata(&mut self) {}

    /// DTD bracket opens; comments and PIs inside are not tree content.
    fn start_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        let _ = (name, public_id, system_id);
    }
    /// DTD bracket closes.
    fn end_dtd(&mut self) {}

    /// An entity the parser skipped.
    fn skipped_entity(&mut self, name: &str) {
        let _ = name;
    }

    /// Unparsed entity declaration from the DTD.
    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation: &str,
    ) {
        let _ = (name, public_id, system_id, notation);
    }

    /// Notation declaration from the DTD.
    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        let _ = (name, public_id, system_id);
    }
}

/// Owned attribute for buffered [`Event`] streams.
#[derive(Debug, Clone, Default)]
pub struct OwnedAttr {
    /// Namespace URI, "" for none.
    pub uri: String,
    /// Local name.
    pub local: String,
    /// Qualified name as written.
    pub qname: String,
    /// Attribute value.
    pub value: String,
    /// True when declared type ID.
    pub is_id: bool,
}

impl OwnedAttr {
    /// Plain unprefixed attribute.
    pub fn new(local: &str, value: &str) -> Self {
        OwnedAttr {
            uri: String::new(),
            local: local.to_string(),
            qname: local.to_string(),
            value: value.to_string(),
            is_id: false,
        }
    }

    /// Borrowed view for handler dispatch.
    pub fn as_attr(&self) -> Attr<'_> {
        Attr {
            uri: &self.uri,
            local: &self.local,
            qname: &self.qname,
            value: &self.value,
            is_id: self.is_id,
        }
    }
}

/// Owned construction event, mirroring [`ContentSink`] one-to-one.
#[derive(Debug, Clone)]
pub enum Event {
    /// Document open.
    StartDocument,
    /// Document close.
    EndDocument,
    /// Prefix binding entering scope.
    StartPrefixMapping {
        /// Prefix, "" for the default namespace.
        prefix: String,
        /// Bound URI.
        uri: String,
    },
    /// Prefix binding leaving scope.
    EndPrefixMapping {
        /// Prefix.
        prefix: String,
    },
    /// Element open.
    StartElement {
        /// Namespace URI, "" for none.
        uri: String,
        /// Local name.
        local: String,
        /// Qualified name as written.
        qname: String,
        /// Attributes.
        attrs: Vec<OwnedAttr>,
    },
    /// Element close.
    EndElement {
        /// Namespace URI.
        uri: String,
        /// Local name.
        local: String,
        /// Qualified name.
        qname: String,
    },
    /// Character content.
    Characters(String),
    /// Ignorable whitespace.
    IgnorableWhitespace(String),
    /// Comment body.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction {
        /// PI target.
        target: String,
        /// PI data.
        data: String,
    },
    /// CDATA bracket open.
    StartCdata,
    /// CDATA bracket close.
    EndCdata,
    /// DTD bracket open.
    StartDtd {
        /// Root element name from the DOCTYPE.
        name: String,
        /// Public identifier.
        public_id: Option<String>,
        /// System identifier.
        system_id: Option<String>,
    },
    /// DTD bracket close.
    EndDtd,
    /// Skipped entity notice.
    SkippedEntity(String),
    /// Unparsed entity declaration.
    UnparsedEntityDecl {
        /// Entity name.
        name: String,
        /// Public identifier.
        public_id: Option<String>,
        /// System identifier.
        system_id: Option<String>,
        /// Notation name.
        notation: String,
    },
    /// Notation declaration.
    NotationDecl {
        /// Notation name.
        name: String,
        /// Public identifier.
        public_id: Option<String>,
        /// System identifier.
        system_id: Option<String>,
    },
}

impl Event {
    /// Dispatch this event to a handler.
    pub fn play<S: ContentSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Event::StartDocument => sink.start_document(),
            Event::EndDocument => sink.end_document(),
            Event::StartPrefixMapping { prefix, uri } => sink.start_prefix_mapping(prefix, uri),
            Event::EndPrefixMapping { prefix } => sink.end_prefix_mapping(prefix),
            Event::StartElement {
                uri,
                local,
                qname,
                attrs,
            } => {
                let borrowed: Vec<Attr<'_>> = attrs.iter().map(OwnedAttr::as_attr).collect();
                sink.start_element(uri, local, qname, &borrowed);
            }
            Event::EndElement { uri, local, qname } => sink.end_element(uri, local, qname),
            Event::Characters(text) => sink.characters(text),
            Event::IgnorableWhitespace(text) => sink.ignorable_whitespace(text),
            Event::Comment(text) => sink.comment(text),
            Event::ProcessingInstruction { target, data } => {
                sink.processing_instruction(target, data)
            }
            Event::StartCdata => sink.start_cdata(),
            Event::EndCdata => sink.end_cdata(),
            Event::StartDtd {
                name,
                public_id,
                system_id,
            } => sink.start_dtd(name, public_id.as_deref(), system_id.as_deref()),
            Event::EndDtd => sink.end_dtd(),
            Event::SkippedEntity(name) => sink.skipped_entity(name),
            Event::UnparsedEntityDecl {
                name,
                public_id,
                system_id,
                notation,
            } => sink.unparsed_entity_decl(
                name,
                public_id.as_deref(),
                system_id.as_deref(),
                notation,
            ),
            Event::NotationDecl {
                name,
                public_id,
                system_id,
            } => sink.notation_decl(name, public_id.as_deref(), system_id.as_deref()),
        }
    }

    /// Shorthand for an unprefixed element open.
    pub fn open(name: &str) -> Event {
        Event::StartElement {
            uri: String::new(),
            local: name.to_string(),
            qname: name.to_string(),
            attrs: Vec::new(),
        }
    }

    /// Shorthand for an unprefixed element open with attributes.
    pub fn open_with(name: &str, attrs: Vec<OwnedAttr>) -> Event {
        Event::StartElement {
            uri: String::new(),
            local: name.to_string(),
            qname: name.to_string(),
            attrs,
        }
    }

    /// Shorthand for an unprefixed element close.
    pub fn close(name: &str) -> Event {
        Event::EndElement {
            uri: String::new(),
            local: name.to_string(),
            qname: name.to_string(),
        }
    }

    /// Shorthand for character content.
    pub fn text(content: &str) -> Event {
        Event::Characters(content.to_string())
    }
}

/// Dispatch a whole event sequence to a handler.
pub fn play_all<S: ContentSink + ?Sized>(events: &[Event], sink: &mut S) {
    for event in events {
        event.play(sink);
    }
}
