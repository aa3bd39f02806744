//! Inline `style` attribute access.
//!
//! Declarations are kept in source order; setting an existing property
//! replaces its value in place.

use std::sync::OnceLock;

use regex::Regex;

use super::{NodeId, Tree};

pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

pub fn format_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a CSS length into its number and unit (`"1.5em"` → `(1.5, "em")`).
pub fn parse_length(value: &str) -> Option<(f64, String)> {
    static LENGTH_REGEX: OnceLock<Regex> = OnceLock::new();
    let length_regex = LENGTH_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(-?\d*\.?\d+)\s*([a-zA-Z%]*)\s*$").expect("Invalid length regex")
    });

    let caps = length_regex.captures(value)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
    Some((number, unit))
}

/// Pixel value of a length given in `px` or without a unit.
pub fn parse_px(value: &str) -> Option<f64> {
    match parse_length(value)? {
        (n, unit) if unit.is_empty() || unit == "px" => Some(n),
        _ => None,
    }
}

pub fn format_px(value: f64) -> String {
    format!("{}px", format_number(value))
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl Tree {
    pub fn style(&self, id: NodeId, prop: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v)
    }

    pub fn set_style(&mut self, id: NodeId, prop: &str, value: impl Into<String>) {
        if self.is_text(id) {
            return;
        }
        let mut decls = parse_declarations(self.attr(id, "style").unwrap_or_default());
        let value = value.into();
        match decls.iter_mut().find(|(p, _)| p == prop) {
            Some((_, v)) => *v = value,
            None => decls.push((prop.to_string(), value)),
        }
        self.set_attr(id, "style", format_declarations(&decls));
    }

    /// Remove one property; the attribute goes away once it is empty.
    pub fn remove_style(&mut self, id: NodeId, prop: &str) {
        let Some(style) = self.attr(id, "style") else {
            return;
        };
        let mut decls = parse_declarations(style);
        decls.retain(|(p, _)| p != prop);
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", format_declarations(&decls));
        }
    }

    pub fn style_px(&self, id: NodeId, prop: &str) -> Option<f64> {
        self.style(id, prop).as_deref().and_then(parse_px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Tag;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("25px", Some((25.0, "px")))]
    #[case(" 1.5em ", Some((1.5, "em")))]
    #[case("-10", Some((-10.0, "")))]
    #[case("auto", None)]
    fn test_parse_length(#[case] input: &str, #[case] expected: Option<(f64, &str)>) {
        let expected = expected.map(|(n, u)| (n, u.to_string()));
        assert_eq!(parse_length(input), expected);
    }

    #[test]
    fn test_set_and_remove_style() {
        let mut tree = Tree::new();
        let p = tree.create_element(Tag::P);

        tree.set_style(p, "margin-left", "25px");
        tree.set_style(p, "color", "red");
        tree.set_style(p, "margin-left", "50px");

        assert_eq!(tree.attr(p, "style"), Some("margin-left: 50px; color: red;"));
        assert_eq!(tree.style_px(p, "margin-left"), Some(50.0));

        tree.remove_style(p, "margin-left");
        tree.remove_style(p, "color");

        assert_eq!(tree.attr(p, "style"), None);
    }

    #[test]
    fn test_format_px() {
        assert_eq!(format_px(25.0), "25px");
        assert_eq!(format_px(12.5), "12.5px");
    }
}
