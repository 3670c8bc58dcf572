//! HTML preview of an extension's blocks

use engine_bridge_core::{Language, Text};
use std::fmt::Write;

use crate::model::{
    ArgumentDescriptor, BlockDescriptor, BlockType, ExtensionDescriptor, DEFAULT_COLOR1,
    DEFAULT_COLOR2,
};

/// Panel title for a descriptor
pub fn preview_title(descriptor: &ExtensionDescriptor, language: Language) -> String {
    language.preview_title(&descriptor.name)
}

/// Render the full preview document
///
/// Pure: the same descriptor and language always produce the same text.
pub fn render_preview(descriptor: &ExtensionDescriptor, language: Language) -> String {
    let color1 = css_color(&descriptor.color1, DEFAULT_COLOR1);
    let color2 = css_color(&descriptor.color2, DEFAULT_COLOR2);

    let mut blocks_html = String::new();
    for block in &descriptor.blocks {
        blocks_html.push_str(&render_block(block, language));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="{html_lang}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            font-family: "Helvetica Neue", Helvetica, Arial, sans-serif;
            background: #f9f9f9;
            padding: 20px;
        }}
        .extension-header {{
            background: {color1};
            color: white;
            padding: 15px 20px;
            border-radius: 8px;
            margin-bottom: 20px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.15);
        }}
        .extension-header h1 {{
            font-size: 18px;
            font-weight: 600;
        }}
        .extension-header .ext-id {{
            font-size: 12px;
            opacity: 0.8;
            margin-top: 4px;
        }}
        .blocks-container {{
            display: flex;
            flex-direction: column;
            gap: 8px;
        }}
        .block {{
            display: inline-flex;
            align-items: center;
            padding: 8px 12px;
            border-radius: 4px;
            font-size: 14px;
            font-weight: 500;
            color: white;
            box-shadow: 0 1px 3px rgba(0,0,0,0.2);
            min-height: 40px;
            flex-wrap: wrap;
            gap: 4px;
            width: fit-content;
        }}
        .block-command {{
            background: {color1};
        }}
        .block-reporter {{
            background: {color1};
            border-radius: 20px;
            padding: 6px 14px;
        }}
        .block-boolean {{
            background: {color1};
            clip-path: polygon(10px 0%, calc(100% - 10px) 0%, 100% 50%, calc(100% - 10px) 100%, 10px 100%, 0% 50%);
            padding: 8px 20px;
        }}
        .block-hat {{
            background: {color1};
            padding-top: 20px;
            border-top: 20px solid {color2};
            border-top-left-radius: 20px;
            border-top-right-radius: 20px;
        }}
        .input-slot {{
            background: white;
            color: #575E75;
            padding: 4px 8px;
            border-radius: 12px;
            font-size: 12px;
            min-width: 40px;
            text-align: center;
            display: inline-block;
        }}
        .input-slot.dropdown {{
            padding-right: 20px;
            position: relative;
        }}
        .input-slot.dropdown::after {{
            content: "\25BC";
            font-size: 8px;
            position: absolute;
            right: 6px;
            top: 50%;
            transform: translateY(-50%);
        }}
        .block-type-label {{
            font-size: 10px;
            color: #666;
            margin-bottom: 4px;
            text-transform: uppercase;
        }}
        .block-wrapper {{
            margin-bottom: 12px;
        }}
    </style>
</head>
<body>
    <div class="extension-header">
        <h1>{name}</h1>
        <div class="ext-id">ID: {id}</div>
    </div>
    <div class="blocks-container">
{blocks_html}    </div>
</body>
</html>
"#,
        html_lang = language.html_lang(),
        title = language.text(Text::PreviewHeading),
        color1 = color1,
        color2 = color2,
        name = escape(&descriptor.name),
        id = escape(&descriptor.id),
        blocks_html = blocks_html,
    )
}

fn render_block(block: &BlockDescriptor, language: Language) -> String {
    let label = match block.block_type {
        BlockType::Command => language.text(Text::BlockTypeCommand),
        BlockType::Reporter => language.text(Text::BlockTypeReporter),
        BlockType::Boolean => language.text(Text::BlockTypeBoolean),
        BlockType::Hat => language.text(Text::BlockTypeHat),
    };

    let mut html = String::new();
    let _ = write!(
        html,
        r#"        <div class="block-wrapper">
            <div class="block-type-label">{}</div>
            <div class="block {}">{}</div>
        </div>
"#,
        label,
        block.block_type.css_class(),
        render_block_text(block)
    );
    html
}

/// Block text with placeholders turned into input slots
enum Piece<'a> {
    Literal(&'a str),
    Slot(&'a ArgumentDescriptor),
}

/// Replace the first `[name]` of each argument, in declaration order
///
/// Only literal template text is searched, so a default value that looks like
/// a placeholder is never substituted again. A placeholder that appears twice
/// keeps its second occurrence as text.
pub fn render_block_text(block: &BlockDescriptor) -> String {
    let mut pieces = vec![Piece::Literal(block.text.as_str())];

    if let Some(arguments) = &block.arguments {
        for (name, argument) in arguments {
            let placeholder = format!("[{}]", name);
            let hit = pieces.iter().enumerate().find_map(|(index, piece)| match piece {
                Piece::Literal(text) => text.find(&placeholder).map(|at| (index, *text, at)),
                Piece::Slot(_) => None,
            });

            if let Some((index, text, at)) = hit {
                let before = &text[..at];
                let after = &text[at + placeholder.len()..];
                pieces[index] = Piece::Literal(after);
                pieces.insert(index, Piece::Slot(argument));
                pieces.insert(index, Piece::Literal(before));
            }
        }
    }

    let mut html = String::new();
    for piece in pieces {
        match piece {
            Piece::Literal(text) => html.push_str(&escape(text)),
            Piece::Slot(argument) => {
                let class = if argument.is_menu() {
                    "input-slot dropdown"
                } else {
                    "input-slot"
                };
                let _ = write!(
                    html,
                    r#"<span class="{}">{}</span>"#,
                    class,
                    escape(&argument.default_text())
                );
            }
        }
    }
    html
}

fn escape(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

/// Accept hex, functional or named colours; anything else gets the fallback
pub fn css_color<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();

    let is_hex = value
        .strip_prefix('#')
        .map(|hex| matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);

    let is_functional = ["rgb(", "rgba(", "hsl(", "hsla("].iter().any(|prefix| {
        value
            .to_ascii_lowercase()
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(')'))
            .map(|args| {
                !args.is_empty()
                    && args
                        .chars()
                        .all(|c| c.is_ascii_digit() || " .,%/".contains(c) || c == '-')
            })
            .unwrap_or(false)
    });

    let is_named = !value.is_empty() && value.len() <= 32 && value.chars().all(|c| c.is_ascii_alphabetic());

    if is_hex || is_functional || is_named {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_color_validation() {
        assert_eq!(css_color("#FF6680", DEFAULT_COLOR1), "#FF6680");
        assert_eq!(css_color("#abc", DEFAULT_COLOR1), "#abc");
        assert_eq!(css_color("rgb(10, 20, 30)", DEFAULT_COLOR1), "rgb(10, 20, 30)");
        assert_eq!(css_color("teal", DEFAULT_COLOR1), "teal");
        assert_eq!(css_color("red; } body { display: none", DEFAULT_COLOR1), DEFAULT_COLOR1);
        assert_eq!(css_color("#12345", DEFAULT_COLOR2), DEFAULT_COLOR2);
        assert_eq!(css_color("", DEFAULT_COLOR2), DEFAULT_COLOR2);
    }

    #[test]
    fn test_block_without_arguments_is_escaped_text() {
        let block = BlockDescriptor {
            opcode: "x".into(),
            block_type: BlockType::Command,
            text: "a < b [X]".into(),
            arguments: None,
        };
        assert_eq!(render_block_text(&block), "a &lt; b [X]");
    }
}
