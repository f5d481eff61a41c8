//! Response encoder: protocol events to callback statements.
//!
//! Every statement addresses the client-side request object by the
//! identifier the caller supplied. All event text goes through
//! [`escape_js_string`], so no payload can end a literal early or smuggle
//! in a statement of its own.

use std::fmt::Write;

use crate::relay::error::RelayFailure;
use crate::relay::event::ResponseEvent;

const NOTIFY: &str = "_onreadystatechangeWrapper()";
const REPARSE: &str = "_parseResponseXML()";
const HEADERS: &str = "_responseHeaders";

/// Turns [`ResponseEvent`]s into statement lines for one client object.
#[derive(Debug, Clone)]
pub struct ScriptEncoder {
    object: String,
}

impl ScriptEncoder {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
        }
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Append the statements for `event` to `out`, one per line.
    pub fn encode(&self, event: &ResponseEvent, out: &mut String) {
        let obj = &self.object;
        match event {
            ResponseEvent::StatusReceived { code, reason } => {
                self.status_lines(*code, reason, out);
                let _ = writeln!(out, "{obj}.{HEADERS} = {{ }};");
            }
            ResponseEvent::HeaderReceived { name, value } => {
                let _ = writeln!(
                    out,
                    "{obj}.{HEADERS}[{}] = {};",
                    escape_js_string(name),
                    escape_js_string(value)
                );
            }
            ResponseEvent::HeadersComplete => self.ready_state("HEADERS_RECEIVED", out),
            ResponseEvent::BodyStarted => {
                self.ready_state("LOADING", out);
                let _ = writeln!(out, "{obj}.responseText = \"\";");
            }
            ResponseEvent::BodyChunk { text } => {
                let _ = writeln!(out, "{obj}.responseText += {};", escape_js_string(text));
            }
            ResponseEvent::Reparse => {
                let _ = writeln!(out, "{obj}.{REPARSE};");
            }
            ResponseEvent::StreamEnded => self.ready_state("DONE", out),
            ResponseEvent::Failure(failure) => self.failure(failure, out),
        }
    }

    /// Convenience wrapper returning the statements as a new string.
    pub fn encode_to_string(&self, event: &ResponseEvent) -> String {
        let mut out = String::new();
        self.encode(event, &mut out);
        out
    }

    fn status_lines(&self, code: u16, reason: &str, out: &mut String) {
        let obj = &self.object;
        let _ = writeln!(out, "{obj}.status = {code};");
        let _ = writeln!(out, "{obj}.statusText = {};", escape_js_string(reason));
    }

    fn ready_state(&self, milestone: &str, out: &mut String) {
        let obj = &self.object;
        let _ = writeln!(out, "{obj}.readyState = {obj}.{milestone};");
        let _ = writeln!(out, "{obj}.{NOTIFY};");
    }

    fn failure(&self, failure: &RelayFailure, out: &mut String) {
        let obj = &self.object;
        self.status_lines(failure.kind.status(), failure.kind.reason(), out);

        let head = format!("{}: {}\n", failure.category, failure.message);
        let _ = writeln!(out, "{obj}.responseText = {} +", escape_js_string(&head));
        for frame in &failure.trace {
            let _ = writeln!(out, "{} +", escape_js_string(&format!("{frame}\n")));
        }
        out.push_str("\"\";\n");

        self.ready_state("DONE", out);
    }
}

/// Quote `text` as a double-quoted script string literal.
///
/// Quote and backslash are escaped, newline/CR/tab use their short forms,
/// printable ASCII passes through and every other UTF-16 code unit becomes
/// a zero-padded `\uXXXX` escape.
pub fn escape_js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for unit in text.encode_utf16() {
        match unit {
            0x22 => out.push_str("\\\""),
            0x5c => out.push_str("\\\\"),
            0x0a => out.push_str("\\n"),
            0x0d => out.push_str("\\r"),
            0x09 => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(unit as u8)),
            _ => {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::error::FailureKind;

    /// Minimal reader for the literals `escape_js_string` produces.
    fn unescape(literal: &str) -> String {
        let inner = literal
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .expect("literal must be quoted");
        let mut units = Vec::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                assert!(c != '"', "unescaped quote inside literal");
                let mut buf = [0u16; 2];
                units.extend_from_slice(c.encode_utf16(&mut buf));
                continue;
            }
            match chars.next().expect("dangling backslash") {
                '"' => units.push(0x22),
                '\\' => units.push(0x5c),
                'n' => units.push(0x0a),
                'r' => units.push(0x0d),
                't' => units.push(0x09),
                'u' => {
                    let hex: String = chars.by_ref().take(4).collect();
                    units.push(u16::from_str_radix(&hex, 16).unwrap());
                }
                other => panic!("unexpected escape \\{other}"),
            }
        }
        String::from_utf16(&units).unwrap()
    }

    #[test]
    fn test_escape_basic_forms() {
        assert_eq!(escape_js_string("hi"), "\"hi\"");
        assert_eq!(escape_js_string("a\"b\\c"), r#""a\"b\\c""#);
        assert_eq!(escape_js_string("l1\nl2\r\t"), r#""l1\nl2\r\t""#);
        assert_eq!(escape_js_string(""), "\"\"");
    }

    #[test]
    fn test_escape_non_printable_and_non_ascii() {
        assert_eq!(escape_js_string("\u{0}"), r#""\u0000""#);
        assert_eq!(escape_js_string("\u{7f}"), r#""\u007f""#);
        assert_eq!(escape_js_string("é"), r#""\u00e9""#);
        assert_eq!(escape_js_string("\u{2028}"), r#""\u2028""#);
        // Outside the BMP: surrogate pair.
        assert_eq!(escape_js_string("😀"), r#""\ud83d\ude00""#);
    }

    #[test]
    fn test_escaped_output_is_printable_ascii() {
        let escaped = escape_js_string("</script>\u{1b}[0m naïve ☃ \u{feff}");
        assert!(escaped.bytes().all(|b| (0x20..=0x7e).contains(&b)));
    }

    #[test]
    fn test_escape_round_trips() {
        let samples = [
            "plain text",
            "quote \" and backslash \\",
            "ctrl \u{1}\u{8}\u{b}\u{c}\u{1f}",
            "lines\r\nand\ttabs",
            "ünïcödé – 漢字 – 😀",
            "\"; alert(1); \"",
        ];
        for sample in samples {
            assert_eq!(unescape(&escape_js_string(sample)), sample);
        }
    }

    #[test]
    fn test_status_event_initializes_header_map() {
        let enc = ScriptEncoder::new("req");
        let out = enc.encode_to_string(&ResponseEvent::StatusReceived {
            code: 200,
            reason: "OK".into(),
        });
        assert_eq!(
            out,
            "req.status = 200;\nreq.statusText = \"OK\";\nreq._responseHeaders = { };\n"
        );
    }

    #[test]
    fn test_header_and_milestones() {
        let enc = ScriptEncoder::new("req");
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::HeaderReceived {
                name: "content-type".into(),
                value: "text/plain; charset=utf-8".into(),
            }),
            "req._responseHeaders[\"content-type\"] = \"text/plain; charset=utf-8\";\n"
        );
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::HeadersComplete),
            "req.readyState = req.HEADERS_RECEIVED;\nreq._onreadystatechangeWrapper();\n"
        );
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::BodyStarted),
            "req.readyState = req.LOADING;\nreq._onreadystatechangeWrapper();\nreq.responseText = \"\";\n"
        );
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::BodyChunk { text: "hi".into() }),
            "req.responseText += \"hi\";\n"
        );
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::Reparse),
            "req._parseResponseXML();\n"
        );
        assert_eq!(
            enc.encode_to_string(&ResponseEvent::StreamEnded),
            "req.readyState = req.DONE;\nreq._onreadystatechangeWrapper();\n"
        );
    }

    #[test]
    fn test_failure_is_one_assignment_then_done() {
        let enc = ScriptEncoder::new("AjaxProxyXMLHttpRequest._existingInstances[42]");
        let out = enc.encode_to_string(&ResponseEvent::Failure(RelayFailure {
            kind: FailureKind::BadGateway,
            category: "TransportError".into(),
            message: "upstream request failed".into(),
            trace: vec!["caused by: connection refused".into()],
        }));

        let obj = "AjaxProxyXMLHttpRequest._existingInstances[42]";
        let expected = format!(
            "{obj}.status = 502;\n\
             {obj}.statusText = \"Bad Gateway\";\n\
             {obj}.responseText = \"TransportError: upstream request failed\\n\" +\n\
             \"caused by: connection refused\\n\" +\n\
             \"\";\n\
             {obj}.readyState = {obj}.DONE;\n\
             {obj}._onreadystatechangeWrapper();\n"
        );
        assert_eq!(out, expected);
    }
}
