//! Table-based document skeleton for email clients.

use super::escape_text;
use super::tokenizer::{Token, Tokenizer};

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en" xmlns="http://www.w3.org/1999/xhtml" xmlns:o="urn:schemas-microsoft-com:office:office">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="x-apple-disable-message-reformatting">
<meta http-equiv="X-UA-Compatible" content="IE=edge">
"#;

const MSO: &str = r"<!--[if mso]>
<noscript><xml><o:OfficeDocumentSettings><o:PixelsPerInch>96</o:PixelsPerInch></o:OfficeDocumentSettings></xml></noscript>
<![endif]-->
";

const BODY_OPEN: &str = r#"</head>
<body style="margin:0;padding:0;background-color:#ffffff;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0" border="0" style="width:100%;border-collapse:collapse;">
<tr>
<td align="center" style="padding:20px 0;">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" border="0" style="width:600px;max-width:600px;border-collapse:collapse;">
<tr>
<td style="padding:20px;font-family:Arial,Helvetica,sans-serif;font-size:16px;line-height:1.5;color:#333333;">
"#;

const BODY_CLOSE: &str = "
</td>
</tr>
</table>
</td>
</tr>
</table>
</body>
</html>
";

/// Wraps an HTML fragment in the fixed table layout.
#[must_use]
pub fn wrap_in_layout(fragment: &str, title: &str) -> String {
    let title = escape_text(title);
    let mut out = String::with_capacity(
        HEAD.len() + MSO.len() + BODY_OPEN.len() + BODY_CLOSE.len() + title.len() + fragment.len() + 16,
    );
    out.push_str(HEAD);
    out.push_str("<title>");
    out.push_str(&title);
    out.push_str("</title>\n");
    out.push_str(MSO);
    out.push_str(BODY_OPEN);
    out.push_str(fragment);
    out.push_str(BODY_CLOSE);
    out
}

/// Returns the inner HTML of `<body>` when given a complete document,
/// otherwise the input itself.
#[must_use]
pub fn body_fragment(html: &str) -> &str {
    if !html.to_ascii_lowercase().contains("<html") {
        return html;
    }

    let mut tokens = Tokenizer::new(html);
    let mut start = None;
    while let Some(token) = tokens.next() {
        match token {
            Token::StartTag(tag) if tag.is("body") && start.is_none() => {
                start = Some(tokens.position());
            }
            Token::EndTag(tag) if start.is_some() && (tag.is("body") || tag.is("html")) => {
                let end = tokens.position() - tag.raw.len();
                return start.map_or(html, |s| &html[s..end]);
            }
            _ => {}
        }
    }

    start.map_or(html, |s| &html[s..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_contains_skeleton() {
        let out = wrap_in_layout("<p>Hello</p>", "News");
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<title>News</title>"));
        assert!(out.contains(r#"<meta charset="utf-8">"#));
        assert!(out.contains("x-apple-disable-message-reformatting"));
        assert!(out.contains("<!--[if mso]>"));
        assert!(out.contains(r#"width="100%""#));
        assert!(out.contains(r#"width="600""#));
        assert!(out.contains("<p>Hello</p>"));
        assert!(!out.contains("display:flex"));
        assert!(!out.contains("display:grid"));
    }

    #[test]
    fn test_title_is_escaped() {
        let out = wrap_in_layout("", "Q&A <live>");
        assert!(out.contains("<title>Q&amp;A &lt;live&gt;</title>"));
    }

    #[test]
    fn test_body_fragment_of_document() {
        let doc = "<!DOCTYPE html><html><head><title>x</title></head><body class=\"b\"><p>Hi</p></body></html>";
        assert_eq!(body_fragment(doc), "<p>Hi</p>");
    }

    #[test]
    fn test_body_fragment_without_body_close() {
        let doc = "<HTML><BODY><p>Hi</p>";
        assert_eq!(body_fragment(doc), "<p>Hi</p>");
    }

    #[test]
    fn test_body_fragment_of_fragment() {
        assert_eq!(body_fragment("<p>Hi</p>"), "<p>Hi</p>");
    }
}
