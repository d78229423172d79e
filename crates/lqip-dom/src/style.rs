//! Style Declarations
//!
//! Ordered `property: value` maps for inline and cascaded style, plus the
//! CSS initial values used when neither source sets a property.

/// Ordered CSS declaration block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclaration {
    properties: Vec<(String, String)>,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a declaration block such as the body of a `style` attribute.
    ///
    /// Semicolons inside parentheses or quotes (e.g. in `url(...)`) do not
    /// terminate a declaration.
    pub fn parse(text: &str) -> Self {
        let mut style = Self::new();
        for declaration in split_top_level(text, ';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if !name.is_empty() && !value.is_empty() {
                style.set_property(name, value);
            }
        }
        style
    }

    /// Get a property value
    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, keeping its position if already declared
    pub fn set_property(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.properties.push((name, value.to_string())),
        }
    }

    /// Remove a property, returning its value
    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        let index = self
            .properties
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.properties.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Serialize as `name: value; name: value;`
    pub fn css_text(&self) -> String {
        self.properties
            .iter()
            .map(|(n, v)| format!("{n}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split on `separator` outside of parentheses and quotes
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

const BLOCK_TAGS: &[&str] = &[
    "html", "body", "div", "section", "article", "header", "footer", "main", "nav", "aside",
    "p", "figure", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// CSS initial value for the properties the engine inspects.
///
/// `display` follows the user-agent stylesheet for common block tags.
pub fn initial_value(tag: &str, property: &str) -> &'static str {
    match property {
        "position" => "static",
        "display" if BLOCK_TAGS.contains(&tag) => "block",
        "display" => "inline",
        "background-image" => "none",
        "background-color" => "rgba(0, 0, 0, 0)",
        "opacity" => "1",
        "z-index" | "width" | "height" | "top" | "left" => "auto",
        _ => "",
    }
}
