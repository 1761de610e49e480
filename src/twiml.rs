/// The closed set of TwiML elements the callbox can emit.
///
/// `Response` is the document root; everything else is a call-control verb.
/// Which attributes and children each kind accepts is fixed data, looked up
/// in [`VerbKind::allowed_attributes`] and [`VerbKind::nesting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbKind {
    Response,
    Say,
    Play,
    Dial,
    Number,
    Gather,
    Record,
    Hangup,
    Redirect,
    Pause,
    Conference,
    Sms,
    Reject,
}

const RESPONSE_NESTING: &[VerbKind] = &[
    VerbKind::Say,
    VerbKind::Play,
    VerbKind::Gather,
    VerbKind::Record,
    VerbKind::Dial,
    VerbKind::Redirect,
    VerbKind::Pause,
    VerbKind::Hangup,
    VerbKind::Sms,
];

const GATHER_NESTING: &[VerbKind] = &[VerbKind::Say, VerbKind::Play, VerbKind::Pause];

const DIAL_NESTING: &[VerbKind] = &[VerbKind::Number, VerbKind::Conference];

impl VerbKind {
    pub fn tag(self) -> &'static str {
        match self {
            VerbKind::Response => "Response",
            VerbKind::Say => "Say",
            VerbKind::Play => "Play",
            VerbKind::Dial => "Dial",
            VerbKind::Number => "Number",
            VerbKind::Gather => "Gather",
            VerbKind::Record => "Record",
            VerbKind::Hangup => "Hangup",
            VerbKind::Redirect => "Redirect",
            VerbKind::Pause => "Pause",
            VerbKind::Conference => "Conference",
            VerbKind::Sms => "Sms",
            VerbKind::Reject => "Reject",
        }
    }

    /// Attribute names Twilio accepts on this element.
    fn allowed_attributes(self) -> &'static [&'static str] {
        match self {
            VerbKind::Response | VerbKind::Hangup => &[],
            VerbKind::Say => &["voice", "language", "loop"],
            VerbKind::Play => &["loop"],
            VerbKind::Dial => &[
                "action",
                "method",
                "timeout",
                "hangupOnStar",
                "timeLimit",
                "callerId",
            ],
            VerbKind::Number => &["url", "sendDigits"],
            VerbKind::Gather => &["action", "method", "timeout", "finishOnKey", "numDigits"],
            VerbKind::Record => &[
                "action",
                "method",
                "timeout",
                "finishOnKey",
                "maxLength",
                "transcribe",
                "transcribeCallback",
                "playBeep",
            ],
            VerbKind::Redirect => &["method"],
            VerbKind::Pause => &["length"],
            VerbKind::Conference => &[
                "muted",
                "beep",
                "startConferenceOnEnter",
                "endConferenceOnExit",
                "waitUrl",
                "waitMethod",
            ],
            VerbKind::Sms => &["to", "from", "action", "method", "statusCallback"],
            VerbKind::Reject => &["reason"],
        }
    }

    /// Child kinds this element may nest, or `None` for leaf verbs.
    fn nesting(self) -> Option<&'static [VerbKind]> {
        match self {
            VerbKind::Response => Some(RESPONSE_NESTING),
            VerbKind::Gather => Some(GATHER_NESTING),
            VerbKind::Dial => Some(DIAL_NESTING),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TwimlError {
    #[error("{attribute} is not a supported attribute for <{tag}>")]
    InvalidAttribute {
        tag: &'static str,
        attribute: String,
    },
    #[error("<{tag}> does not support nesting")]
    NestingNotSupported { tag: &'static str },
    #[error("<{child}> is not an allowed verb inside <{parent}>")]
    InvalidChild {
        parent: &'static str,
        child: &'static str,
    },
}

/// One node in a TwiML tree: a kind tag, an optional text body, attributes
/// in insertion order, and append-only children.
///
/// Trees are built once per request and rendered once; nothing is ever
/// removed or reordered after an append.
#[derive(Debug, Clone)]
pub struct Verb {
    kind: VerbKind,
    body: Option<String>,
    attrs: Vec<(String, String)>,
    children: Vec<Verb>,
}

impl Verb {
    /// Construct a verb, validating every attribute against the kind's
    /// whitelist. Validation runs before anything is built, so a failed
    /// construction never leaves a half-configured verb behind.
    pub fn new(
        kind: VerbKind,
        body: Option<&str>,
        attrs: &[(&str, &str)],
    ) -> Result<Self, TwimlError> {
        let allowed = kind.allowed_attributes();
        for (key, _) in attrs {
            if !allowed.iter().any(|a| a == key) {
                return Err(TwimlError::InvalidAttribute {
                    tag: kind.tag(),
                    attribute: (*key).to_string(),
                });
            }
        }
        Ok(Self {
            kind,
            body: body.map(str::to_string),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            children: Vec::new(),
        })
    }

    /// The document root.
    pub fn response() -> Self {
        Self {
            kind: VerbKind::Response,
            body: None,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> VerbKind {
        self.kind
    }

    /// Append a child verb, returning a reference to it so callers can keep
    /// building under the new node.
    pub fn append(&mut self, child: Verb) -> Result<&mut Verb, TwimlError> {
        let allowed = self.kind.nesting().ok_or(TwimlError::NestingNotSupported {
            tag: self.kind.tag(),
        })?;
        if !allowed.contains(&child.kind) {
            return Err(TwimlError::InvalidChild {
                parent: self.kind.tag(),
                child: child.kind.tag(),
            });
        }
        let idx = self.children.len();
        self.children.push(child);
        Ok(&mut self.children[idx])
    }

    /// Set an attribute with no whitelist check, overwriting any existing
    /// value. The deliberate escape hatch from the strict constructor path.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k.as_str() == key) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn say(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Say, Some(body), attrs)?)
    }

    pub fn play(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Play, Some(body), attrs)?)
    }

    pub fn dial(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Dial, Some(body), attrs)?)
    }

    pub fn number(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Number, Some(body), attrs)?)
    }

    pub fn gather(&mut self, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Gather, None, attrs)?)
    }

    pub fn record(&mut self, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Record, None, attrs)?)
    }

    pub fn hangup(&mut self) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Hangup, None, &[])?)
    }

    pub fn redirect(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Redirect, Some(body), attrs)?)
    }

    pub fn pause(&mut self, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Pause, None, attrs)?)
    }

    pub fn conference(
        &mut self,
        body: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Conference, Some(body), attrs)?)
    }

    pub fn sms(&mut self, body: &str, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Sms, Some(body), attrs)?)
    }

    pub fn reject(&mut self, attrs: &[(&str, &str)]) -> Result<&mut Verb, TwimlError> {
        self.append(Verb::new(VerbKind::Reject, None, attrs)?)
    }

    /// Render the tree as a complete XML document. Pure and idempotent:
    /// rendering the same tree twice yields byte-identical output.
    ///
    /// A `Response` root writes only its children inside the document
    /// element; it never appears as a nested verb itself.
    pub fn render(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        if self.kind == VerbKind::Response {
            out.push_str("<Response>");
            for child in &self.children {
                child.write(&mut out);
            }
            out.push_str("</Response>");
        } else {
            self.write(&mut out);
        }
        out
    }

    /// The rendered document percent-encoded, for embedding the TwiML in a
    /// URL parameter (e.g. Twilio's echo endpoint).
    pub fn render_url_encoded(&self) -> String {
        urlencoding::encode(&self.render()).into_owned()
    }

    fn write(&self, out: &mut String) {
        let tag = self.kind.tag();
        out.push('<');
        out.push_str(tag);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        let body = self.body.as_deref().unwrap_or("");
        if body.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(body));
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
