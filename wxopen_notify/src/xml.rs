use std::fmt::Write as _;

use quick_xml::escape::escape;

/// Builds the flat `<xml>` documents exchanged with the platform
///
/// String values are wrapped in CDATA sections, as the platform does.
#[derive(Debug)]
pub(crate) struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        Self {
            buf: String::from("<xml>"),
        }
    }

    pub(crate) fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.open(name);
        if value.contains("]]>") {
            self.buf.push_str(&escape(value));
        } else {
            self.buf.push_str("<![CDATA[");
            self.buf.push_str(value);
            self.buf.push_str("]]>");
        }
        self.close(name);
        self
    }

    pub(crate) fn optional_text(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.text(name, value);
        }
        self
    }

    pub(crate) fn number(&mut self, name: &str, value: i64) -> &mut Self {
        self.open(name);
        // Writing to a String cannot fail
        let _ = write!(self.buf, "{value}");
        self.close(name);
        self
    }

    pub(crate) fn optional_number(&mut self, name: &str, value: Option<i64>) -> &mut Self {
        if let Some(value) = value {
            self.number(name, value);
        }
        self
    }

    pub(crate) fn nested(&mut self, name: &str, f: impl FnOnce(&mut Self)) -> &mut Self {
        self.open(name);
        f(self);
        self.close(name);
        self
    }

    pub(crate) fn finish(mut self) -> String {
        self.buf.push_str("</xml>");
        self.buf
    }

    fn open(&mut self, name: &str) {
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push('>');
    }

    fn close(&mut self, name: &str) {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
    }
}
