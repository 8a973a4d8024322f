//! Turn a Gmail `Message` into the plain text the classifier reads.

use google_gmail1::api::{Message, MessagePart};
use once_cell::sync::Lazy;
use regex::Regex;
use shared_types::{EmailContent, NO_DATE, NO_SENDER, NO_SUBJECT};

static RE_DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<head[^>]*>.*?</head>")
        .expect("valid regex")
});
static RE_LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>").expect("valid regex"));
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract headers and a whitespace-normalized text body
pub fn parse_message(message: &Message) -> EmailContent {
    let header = |name: &str, fallback: &str| {
        find_header(message, name).unwrap_or_else(|| fallback.to_string())
    };

    let body = match message.payload.as_ref() {
        Some(payload) => {
            let mut text = String::new();
            let mut html = String::new();
            collect_bodies(payload, &mut text, &mut html);

            if text.trim().is_empty() {
                html_to_text(&html)
            } else {
                text
            }
        }
        None => String::new(),
    };

    EmailContent {
        id: message.id.clone().unwrap_or_default(),
        subject: header("subject", NO_SUBJECT),
        sender: header("from", NO_SENDER),
        date: header("date", NO_DATE),
        snippet: message.snippet.clone().unwrap_or_default(),
        body: collapse_whitespace(&body),
    }
}

/// Case-insensitive lookup of a top-level header
fn find_header(message: &Message, name: &str) -> Option<String> {
    message
        .payload
        .as_ref()?
        .headers
        .as_ref()?
        .iter()
        .find(|h| {
            h.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h.value.clone())
}

/// Walk the MIME tree, appending every text/plain and text/html part in order
fn collect_bodies(part: &MessagePart, text: &mut String, html: &mut String) {
    if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
        let mime = part
            .mime_type
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if mime.contains("text/html") {
            html.push_str(&String::from_utf8_lossy(data));
        } else if mime.contains("text/plain") {
            text.push_str(&String::from_utf8_lossy(data));
        }
    }

    if let Some(parts) = &part.parts {
        for child in parts {
            collect_bodies(child, text, html);
        }
    }
}

/// Strip markup from an HTML body, keeping the readable text
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = RE_DROP_BLOCKS.replace_all(html, " ");
    let text = RE_LINE_BREAK.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, " ");
    let text = html_escape::decode_html_entities(&text);

    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn leaf(mime: &str, data: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(MessagePartBody {
                data: Some(data.as_bytes().to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn message(payload: MessagePart) -> Message {
        Message {
            id: Some("18c2f".to_string()),
            snippet: Some("Your weekly digest".to_string()),
            payload: Some(payload),
            ..Default::default()
        }
    }

    #[test]
    fn test_headers_case_insensitive_with_fallbacks() {
        let mut payload = leaf("text/plain", "hello");
        payload.headers = Some(vec![
            header("SUBJECT", "Weekly Newsletter"),
            header("from", "news@example.com"),
        ]);

        let email = parse_message(&message(payload));
        assert_eq!(email.id, "18c2f");
        assert_eq!(email.subject, "Weekly Newsletter");
        assert_eq!(email.sender, "news@example.com");
        assert_eq!(email.date, NO_DATE);
        assert_eq!(email.snippet, "Your weekly digest");
    }

    #[test]
    fn test_missing_payload() {
        let email = parse_message(&Message::default());
        assert_eq!(email.subject, NO_SUBJECT);
        assert_eq!(email.sender, NO_SENDER);
        assert_eq!(email.body, "");
    }

    #[test]
    fn test_plain_text_preferred_over_html() {
        let payload = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![
                leaf("text/plain", "Please pay\n\n  by Friday."),
                leaf("text/html", "<p>Please <b>pay</b> by Friday.</p>"),
            ]),
            ..Default::default()
        };

        let email = parse_message(&message(payload));
        assert_eq!(email.body, "Please pay by Friday.");
    }

    #[test]
    fn test_html_only_body_is_converted() {
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: Some(vec![MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                parts: Some(vec![leaf(
                    "text/html; charset=UTF-8",
                    "<html><head><title>x</title></head><body>\
                     <style>.a{color:red}</style>\
                     <p>Big&nbsp;sale &amp; more</p><script>track()</script>\
                     Unsubscribe anytime</body></html>",
                )]),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let email = parse_message(&message(payload));
        // &nbsp; decodes to U+00A0, which counts as whitespace
        assert_eq!(email.body, "Big sale & more Unsubscribe anytime");
    }

    #[test]
    fn test_html_to_text_keeps_line_breaks() {
        let text = html_to_text("<p>Line one<br/>Line   two</p><p>Para</p>");
        assert_eq!(text, "Line one\nLine two\nPara");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let payload = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessagePartBody {
                data: Some(vec![b'o', b'k', 0xff, b'!']),
                ..Default::default()
            }),
            ..Default::default()
        };

        let email = parse_message(&message(payload));
        assert_eq!(email.body, "ok\u{fffd}!");
    }
}
