//! Telephony markup (TwiML) responses
//!
//! A [`TurnResponse`] is an ordered list of verbs inside a `<Response>` root.
//! Rendering escapes every text node and attribute value, so the output is
//! well-formed whatever the reply text contains.

use std::fmt::Write as _;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Speech-gathering prompt settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherSpec {
    /// Input mode (`speech`, `dtmf`, `speech dtmf`)
    pub input: String,
    /// Callback path the platform posts the result to
    pub action: String,
    /// HTTP method for the callback
    pub method: String,
    /// Seconds of silence before the platform gives up
    pub timeout_secs: u32,
    /// Recognition locale, e.g. `nl-NL`
    pub language: String,
    /// Platform end-of-speech detection (`auto` or seconds)
    pub speech_timeout: Option<String>,
}

/// A single markup instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// Speak text with the platform's built-in voice
    Say {
        text: String,
        language: Option<String>,
        voice: Option<String>,
    },
    /// Play a hosted audio file
    Play { url: String },
    /// Open a speech-gathering prompt
    Gather(GatherSpec),
    /// Continue the call at another path
    Redirect { path: String, method: String },
}

/// Outbound markup document for one webhook invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnResponse {
    verbs: Vec<Verb>,
}

impl TurnResponse {
    /// Create an empty response
    #[must_use]
    pub const fn new() -> Self {
        Self { verbs: Vec::new() }
    }

    /// Append a `Say` verb
    #[must_use]
    pub fn say(
        mut self,
        text: impl Into<String>,
        language: Option<&str>,
        voice: Option<&str>,
    ) -> Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            language: language.map(ToString::to_string),
            voice: voice.map(ToString::to_string),
        });
        self
    }

    /// Append a `Play` verb
    #[must_use]
    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    /// Append a `Gather` verb
    #[must_use]
    pub fn gather(mut self, spec: GatherSpec) -> Self {
        self.verbs.push(Verb::Gather(spec));
        self
    }

    /// Append a `Redirect` verb
    #[must_use]
    pub fn redirect(mut self, path: impl Into<String>, method: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect {
            path: path.into(),
            method: method.into(),
        });
        self
    }

    /// Verbs in document order
    #[must_use]
    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Whether the response plays hosted audio
    #[must_use]
    pub fn has_play(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Play { .. }))
    }

    /// Text of the first `Say` verb, if any
    #[must_use]
    pub fn spoken_text(&self) -> Option<&str> {
        self.verbs.iter().find_map(|v| match v {
            Verb::Say { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Whether the conversation continues after this response
    #[must_use]
    pub fn continues_conversation(&self) -> bool {
        self.verbs
            .iter()
            .any(|v| matches!(v, Verb::Gather(_) | Verb::Redirect { .. }))
    }

    /// Render the markup document
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");

        for verb in &self.verbs {
            match verb {
                Verb::Say {
                    text,
                    language,
                    voice,
                } => {
                    out.push_str("<Say");
                    if let Some(voice) = voice {
                        push_attr(&mut out, "voice", voice);
                    }
                    if let Some(language) = language {
                        push_attr(&mut out, "language", language);
                    }
                    let _ = write!(out, ">{}</Say>", escape_xml(text));
                }
                Verb::Play { url } => {
                    let _ = write!(out, "<Play>{}</Play>", escape_xml(url));
                }
                Verb::Gather(spec) => {
                    out.push_str("<Gather");
                    push_attr(&mut out, "input", &spec.input);
                    push_attr(&mut out, "action", &spec.action);
                    push_attr(&mut out, "method", &spec.method);
                    push_attr(&mut out, "timeout", &spec.timeout_secs.to_string());
                    if let Some(speech_timeout) = &spec.speech_timeout {
                        push_attr(&mut out, "speechTimeout", speech_timeout);
                    }
                    push_attr(&mut out, "language", &spec.language);
                    out.push_str("/>");
                }
                Verb::Redirect { path, method } => {
                    out.push_str("<Redirect");
                    push_attr(&mut out, "method", method);
                    let _ = write!(out, ">{}</Redirect>", escape_xml(path));
                }
            }
        }

        out.push_str("</Response>");
        out
    }
}

impl IntoResponse for TurnResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/xml")], self.render()).into_response()
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape_xml(value));
}

/// Escape XML special characters and blank out characters XML cannot carry
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            // Not representable in XML 1.0
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}
