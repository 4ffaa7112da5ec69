//! HTML directory listing

use crate::store::Metadata;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Write;

/// Characters escaped inside one path segment of a link
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escape text for use in HTML content and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode each segment of a `/`-separated path
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the listing of a directory requested as `request_path`
///
/// Only the given entries are listed (no recursion), sorted by name. Names
/// and paths are escaped before they reach the document.
pub fn render(request_path: &str, mut entries: Vec<Metadata>) -> String {
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let base = request_path.trim_end_matches('/');
    let title = escape_html(request_path);

    let mut html = String::with_capacity(256 + entries.len() * 128);
    let _ = write!(
        html,
        "<html><head><title>{0}</title><style>.dir {{ font-weight: bold }}</style></head><body><h1>{0}</h1><ul>",
        title
    );

    if !base.is_empty() {
        let parent = match base.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => format!("{}/", parent),
            _ => "/".to_string(),
        };
        let _ = write!(
            html,
            "<li><a href=\"{}\" class=\"dir\">..</a></li>",
            escape_html(&encode_path(&parent))
        );
    }

    for entry in &entries {
        let href = escape_html(&format!(
            "{}/{}",
            encode_path(base),
            utf8_percent_encode(&entry.name, SEGMENT)
        ));
        let (class, aux) = if entry.is_dir {
            ("dir", "dir".to_string())
        } else {
            ("file", format!("file, {} bytes", entry.size))
        };
        let modified = entry
            .modified
            .map(httpdate::fmt_http_date)
            .unwrap_or_else(|| "-".to_string());

        let _ = write!(
            html,
            "<li><a href=\"{}\" class=\"{}\">{}</a>, {}, last modified {}</li>",
            href,
            class,
            escape_html(&entry.name),
            aux,
            modified
        );
    }

    html.push_str("</ul></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn file(name: &str, size: u64) -> Metadata {
        Metadata {
            name: name.to_string(),
            is_dir: false,
            size,
            modified: None,
        }
    }

    fn dir(name: &str) -> Metadata {
        Metadata {
            name: name.to_string(),
            is_dir: true,
            size: 0,
            modified: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_entries_sorted() {
        let html = render("/docs", vec![file("zeta.txt", 1), dir("alpha"), file("beta.md", 22)]);
        let alpha = html.find(">alpha<").unwrap();
        let beta = html.find(">beta.md<").unwrap();
        let zeta = html.find(">zeta.txt<").unwrap();
        assert!(alpha < beta && beta < zeta);
    }

    #[test]
    fn test_entry_markup() {
        let html = render("/docs/", vec![file("a.txt", 42), dir("sub")]);
        assert!(html.contains("<title>/docs/</title>"));
        assert!(html.contains("<h1>/docs/</h1>"));
        assert!(html.contains(r#"<a href="/docs/a.txt" class="file">a.txt</a>, file, 42 bytes, last modified -"#));
        assert!(html.contains(r#"<a href="/docs/sub" class="dir">sub</a>, dir,"#));
    }

    #[test]
    fn test_parent_link() {
        assert!(!render("/", vec![]).contains(">..<"));
        assert!(render("/docs", vec![]).contains(r#"<a href="/" class="dir">..</a>"#));
        assert!(render("/docs/api/", vec![]).contains(r#"<a href="/docs/" class="dir">..</a>"#));
    }

    #[test]
    fn test_hostile_name_is_escaped() {
        let name = r#"<script>alert("x")</script>&.txt"#;
        let html = render("/<b>", vec![file(name, 1)]);

        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;alert(&#34;x&#34;)&lt;/script&gt;&amp;.txt"));
        assert!(html.contains("<title>/&lt;b&gt;</title>"));
    }

    #[test]
    fn test_href_is_percent_encoded() {
        let html = render("/", vec![file("a b#c?.txt", 1)]);
        assert!(html.contains(r#"href="/a%20b%23c%3F.txt""#));
    }

    #[test]
    fn test_modified_time() {
        let mut entry = file("a.txt", 1);
        entry.modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(784111777));
        let html = render("/", vec![entry]);
        assert!(html.contains("last modified Sun, 06 Nov 1994 08:49:37 GMT"));
    }
}
