//! HTML presentation of directory listings.
//!
//! This is the daemon's rendering collaborator: it receives the entry
//! set produced by the sandbox lister and turns it into a minimal HTML
//! page. Nothing here touches the filesystem.

use maud::{html, Markup, DOCTYPE};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sandbox::Listing;

/// Characters escaped in hrefs beyond controls. Mirrors what a URL path
/// segment must not contain verbatim.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'/')
    .add(b'\\');

/// Render one directory listing page.
///
/// `title` is the decoded path relative to the share, shown as-is.
/// Folder hrefs get a trailing slash so relative navigation keeps
/// working from directory URLs.
pub fn page(title: &str, read_only: bool, listing: &Listing) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " - skiff" }
                style { (STYLE) }
            }
            body {
                h1 { (title) }
                @if read_only {
                    p.ro { "read-only" }
                }
                table {
                    @for folder in &listing.folders {
                        tr.folder {
                            td { a href=(folder_href(&folder.name)) { (folder.name) "/" } }
                            td {}
                            td.ext { "folder" }
                        }
                    }
                    @for file in &listing.files {
                        tr.file {
                            td { a href=(encode_segment(&file.name)) { (file.name) } }
                            td.size { (humanize(file.size.unwrap_or(0))) }
                            td.ext { (file.ext) }
                        }
                    }
                }
            }
        }
    }
}

const STYLE: &str = "\
body { font-family: monospace; margin: 2em auto; max-width: 48em; }
table { width: 100%; border-collapse: collapse; }
td { padding: 0.15em 0.5em; }
td.size, td.ext { text-align: right; color: #777; }
p.ro { color: #a00; }
a { text-decoration: none; }
a:hover { text-decoration: underline; }";

fn folder_href(name: &str) -> String {
    if name == ".." {
        "../".to_string()
    } else {
        format!("{}/", encode_segment(name))
    }
}

fn encode_segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

/// Format a byte count with one decimal and a 1024-based unit suffix.
pub fn humanize(bytes: u64) -> String {
    const UNITS: [&str; 9] = ["B", "k", "M", "G", "T", "P", "E", "Z", "Y"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox::Entry;

    fn entry(name: &str, size: Option<u64>, is_dir: bool) -> Entry {
        Entry {
            name: name.to_string(),
            is_dir,
            size,
            ext: if is_dir { String::new() } else { "txt".to_string() },
        }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize(0), "0.0B");
        assert_eq!(humanize(10), "10.0B");
        assert_eq!(humanize(1023), "1023.0B");
        assert_eq!(humanize(1024), "1.0k");
        assert_eq!(humanize(1536), "1.5k");
        assert_eq!(humanize(1024 * 1024), "1.0M");
        assert_eq!(humanize(5 * 1024 * 1024 * 1024), "5.0G");
    }

    #[test]
    fn test_page_contains_entries() {
        let listing = Listing {
            folders: vec![entry("sub", None, true)],
            files: vec![entry("a.txt", Some(10), false)],
        };

        let markup = page("/", false, &listing).into_string();
        assert!(markup.contains("sub/"));
        assert!(markup.contains("a.txt"));
        assert!(markup.contains("10.0B"));
    }

    #[test]
    fn test_page_escapes_names() {
        let listing = Listing {
            folders: vec![],
            files: vec![entry("<script>.txt", Some(1), false)],
        };

        let markup = page("/", false, &listing).into_string();
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_hrefs_are_percent_encoded() {
        let listing = Listing {
            folders: vec![entry("my dir", None, true)],
            files: vec![entry("50% off.txt", Some(1), false)],
        };

        let markup = page("/", false, &listing).into_string();
        assert!(markup.contains("my%20dir/"));
        assert!(markup.contains("50%25%20off.txt"));
    }

    #[test]
    fn test_parent_href() {
        assert_eq!(folder_href(".."), "../");
        assert_eq!(folder_href("sub"), "sub/");
    }

    #[test]
    fn test_read_only_marker() {
        let listing = Listing::default();
        assert!(page("/", true, &listing).into_string().contains("read-only"));
        assert!(!page("/", false, &listing).into_string().contains("read-only"));
    }
}
