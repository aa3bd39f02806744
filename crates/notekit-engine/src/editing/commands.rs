use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::Tag;
use crate::range::Range;

/// Link settings for [`Cmd::CreateLink`], also returned by
/// `getLinkInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "isNewWindow", alias = "new_window")]
    pub new_window: bool,
    /// Range to link instead of the last selection
    #[serde(skip)]
    pub range: Option<Range>,
}

/// A file handed over for inline embedding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Float {
    Left,
    Right,
    None,
}

impl FromStr for Float {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Float::Left),
            "right" => Ok(Float::Right),
            "none" | "" => Ok(Float::None),
            other => Err(format!("unknown float `{other}`")),
        }
    }
}

/// Every mutating operation the editor performs.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Superscript,
    Subscript,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
    JustifyFull,
    FormatBlock(Tag),
    FormatPara,
    /// Heading level 1 to 6
    FormatH(u8),
    RemoveFormat,
    LineHeight(String),
    FontName(String),
    /// Size without a unit; the current unit is appended
    FontSize(String),
    FontSizeUnit(String),
    ForeColor(String),
    BackColor(String),
    Color {
        fore: Option<String>,
        back: Option<String>,
    },
    InsertText(String),
    /// Markup of the nodes to insert
    InsertNode(String),
    PasteHtml(String),
    InsertParagraph,
    InsertHorizontalRule,
    InsertTable {
        cols: usize,
        rows: usize,
    },
    InsertOrderedList,
    InsertUnorderedList,
    Indent,
    Outdent,
    CreateLink(LinkInfo),
    Unlink,
    RemoveMedia,
    FloatMe(Float),
    Resize(f64),
    InsertImage {
        src: String,
        filename: Option<String>,
    },
    InsertImagesAsDataUrl(Vec<ImageFile>),
    Undo,
    Redo,
    Commit,
    Tab,
    Untab,
    Empty,
}

impl Cmd {
    /// Build a command from an invocation name and its JSON arguments.
    ///
    /// Returns `None` for unknown names or arguments of the wrong shape.
    pub fn from_invocation(method: &str, args: &[Value]) -> Option<Self> {
        let text = |index: usize| args.get(index).and_then(value_to_string);

        if let Some(level) = method.strip_prefix("formatH") {
            return level
                .parse()
                .ok()
                .filter(|l| (1..=6).contains(l))
                .map(Cmd::FormatH);
        }

        let cmd = match method {
            "bold" => Cmd::Bold,
            "italic" => Cmd::Italic,
            "underline" => Cmd::Underline,
            "strikethrough" => Cmd::Strikethrough,
            "superscript" => Cmd::Superscript,
            "subscript" => Cmd::Subscript,
            "justifyLeft" => Cmd::JustifyLeft,
            "justifyCenter" => Cmd::JustifyCenter,
            "justifyRight" => Cmd::JustifyRight,
            "justifyFull" => Cmd::JustifyFull,
            "formatBlock" => Cmd::FormatBlock(Tag::from_name(
                text(0)?.trim_matches(|c| c == '<' || c == '>'),
            )),
            "formatPara" => Cmd::FormatPara,
            "removeFormat" => Cmd::RemoveFormat,
            "lineHeight" => Cmd::LineHeight(text(0)?),
            "fontName" => Cmd::FontName(text(0)?),
            "fontSize" => Cmd::FontSize(text(0)?),
            "fontSizeUnit" => Cmd::FontSizeUnit(text(0)?),
            "foreColor" => Cmd::ForeColor(text(0)?),
            "backColor" => Cmd::BackColor(text(0)?),
            "color" => {
                let info = args.first()?;
                Cmd::Color {
                    fore: info.get("foreColor").and_then(value_to_string),
                    back: info.get("backColor").and_then(value_to_string),
                }
            }
            "insertText" => Cmd::InsertText(text(0)?),
            "insertNode" => Cmd::InsertNode(text(0)?),
            "pasteHTML" => Cmd::PasteHtml(text(0)?),
            "insertParagraph" => Cmd::InsertParagraph,
            "insertHorizontalRule" => Cmd::InsertHorizontalRule,
            "insertTable" => {
                let dimension = text(0)?;
                let (cols, rows) = dimension.split_once('x')?;
                Cmd::InsertTable {
                    cols: cols.trim().parse().ok()?,
                    rows: rows.trim().parse().ok()?,
                }
            }
            "insertOrderedList" => Cmd::InsertOrderedList,
            "insertUnorderedList" => Cmd::InsertUnorderedList,
            "indent" => Cmd::Indent,
            "outdent" => Cmd::Outdent,
            "createLink" => Cmd::CreateLink(serde_json::from_value(args.first()?.clone()).ok()?),
            "unlink" => Cmd::Unlink,
            "removeMedia" => Cmd::RemoveMedia,
            "floatMe" => Cmd::FloatMe(text(0)?.parse().ok()?),
            "resize" => Cmd::Resize(text(0)?.trim().parse().ok()?),
            "insertImage" => Cmd::InsertImage {
                src: text(0)?,
                filename: text(1),
            },
            "insertImagesAsDataURL" => {
                Cmd::InsertImagesAsDataUrl(serde_json::from_value(args.first()?.clone()).ok()?)
            }
            "undo" => Cmd::Undo,
            "redo" => Cmd::Redo,
            "commit" => Cmd::Commit,
            "tab" => Cmd::Tab,
            "untab" => Cmd::Untab,
            "empty" => Cmd::Empty,
            _ => return None,
        };
        Some(cmd)
    }

    /// Invocation name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Cmd::Bold => "bold",
            Cmd::Italic => "italic",
            Cmd::Underline => "underline",
            Cmd::Strikethrough => "strikethrough",
            Cmd::Superscript => "superscript",
            Cmd::Subscript => "subscript",
            Cmd::JustifyLeft => "justifyLeft",
            Cmd::JustifyCenter => "justifyCenter",
            Cmd::JustifyRight => "justifyRight",
            Cmd::JustifyFull => "justifyFull",
            Cmd::FormatBlock(_) => "formatBlock",
            Cmd::FormatPara => "formatPara",
            Cmd::FormatH(_) => "formatH",
            Cmd::RemoveFormat => "removeFormat",
            Cmd::LineHeight(_) => "lineHeight",
            Cmd::FontName(_) => "fontName",
            Cmd::FontSize(_) => "fontSize",
            Cmd::FontSizeUnit(_) => "fontSizeUnit",
            Cmd::ForeColor(_) => "foreColor",
            Cmd::BackColor(_) => "backColor",
            Cmd::Color { .. } => "color",
            Cmd::InsertText(_) => "insertText",
            Cmd::InsertNode(_) => "insertNode",
            Cmd::PasteHtml(_) => "pasteHTML",
            Cmd::InsertParagraph => "insertParagraph",
            Cmd::InsertHorizontalRule => "insertHorizontalRule",
            Cmd::InsertTable { .. } => "insertTable",
            Cmd::InsertOrderedList => "insertOrderedList",
            Cmd::InsertUnorderedList => "insertUnorderedList",
            Cmd::Indent => "indent",
            Cmd::Outdent => "outdent",
            Cmd::CreateLink(_) => "createLink",
            Cmd::Unlink => "unlink",
            Cmd::RemoveMedia => "removeMedia",
            Cmd::FloatMe(_) => "floatMe",
            Cmd::Resize(_) => "resize",
            Cmd::InsertImage { .. } => "insertImage",
            Cmd::InsertImagesAsDataUrl(_) => "insertImagesAsDataURL",
            Cmd::Undo => "undo",
            Cmd::Redo => "redo",
            Cmd::Commit => "commit",
            Cmd::Tab => "tab",
            Cmd::Untab => "untab",
            Cmd::Empty => "empty",
        }
    }
}

/// Strings pass through, numbers and booleans are printed.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("bold", vec![], Some(Cmd::Bold))]
    #[case("formatH3", vec![], Some(Cmd::FormatH(3)))]
    #[case("formatH7", vec![], None)]
    #[case("formatBlock", vec![json!("<pre>")], Some(Cmd::FormatBlock(Tag::Pre)))]
    #[case("fontSize", vec![json!(18)], Some(Cmd::FontSize("18".into())))]
    #[case("insertTable", vec![json!("3x2")], Some(Cmd::InsertTable { cols: 3, rows: 2 }))]
    #[case("insertTable", vec![json!("3by2")], None)]
    #[case("resize", vec![json!("0.5")], Some(Cmd::Resize(0.5)))]
    #[case("floatMe", vec![json!("left")], Some(Cmd::FloatMe(Float::Left)))]
    #[case("insertText", vec![], None)]
    #[case("linkDialog", vec![], None)]
    fn test_from_invocation(
        #[case] method: &str,
        #[case] args: Vec<Value>,
        #[case] expected: Option<Cmd>,
    ) {
        assert_eq!(Cmd::from_invocation(method, &args), expected);
    }

    #[test]
    fn test_create_link_arguments() {
        let args = [json!({"url": "example.com", "text": "site", "isNewWindow": true})];

        let cmd = Cmd::from_invocation("createLink", &args);

        assert_eq!(
            cmd,
            Some(Cmd::CreateLink(LinkInfo {
                url: "example.com".into(),
                text: "site".into(),
                new_window: true,
                range: None,
            }))
        );
    }

    #[test]
    fn test_color_arguments() {
        let cmd = Cmd::from_invocation("color", &[json!({"foreColor": "red"})]);

        assert_eq!(
            cmd,
            Some(Cmd::Color {
                fore: Some("red".into()),
                back: None,
            })
        );
    }

    #[test]
    fn test_image_files_arguments() {
        let args = [json!([{"name": "a.png", "type": "image/png", "bytes": [1, 2]}])];

        let Some(Cmd::InsertImagesAsDataUrl(files)) = Cmd::from_invocation("insertImagesAsDataURL", &args)
        else {
            panic!("Should parse image files");
        };

        assert_eq!(files[0].mime, "image/png");
        assert_eq!(files[0].bytes, vec![1, 2]);
    }
}
