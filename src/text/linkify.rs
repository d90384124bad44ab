//! Turns bare URLs, IPv4 literals and hostnames in plain text into anchors.
//!
//! Three ordered phases: code-like tokens and a few known multi-line shapes
//! are swapped for opaque placeholders, links are detected in what remains,
//! then the placeholders are put back verbatim. Input that already carries
//! markup is returned untouched, which also makes the transform a no-op on
//! its own output.

use crate::util::html_escape;
use regex::Regex;
use std::sync::OnceLock;

/// A "do not touch" shape hidden from link detection.
struct Shape {
  pattern: &'static str,
  /// Skip matches directly followed by `.<digit>` (version-like suffixes).
  unless_version_follows: bool,
  /// Skip matches starting with `www.` in any case; those are hostnames.
  unless_www: bool,
}

const PROTECTED_SHAPES: &[Shape] = &[
  // dotted call: `a.b.c(...)`
  Shape {
    pattern: r"(?:[a-zA-Z_][a-zA-Z0-9_]*\.)+[a-zA-Z_][a-zA-Z0-9_]*\([^)]*\)",
    unless_version_follows: false,
    unless_www: false,
  },
  // `foo.bar.module`, `x.y.class`, ...
  Shape {
    pattern: r"(?:[a-zA-Z_][a-zA-Z0-9_]*\.)+(?:module|class|interface|enum)\b",
    unless_version_follows: false,
    unless_www: false,
  },
  // type reference: `java.lang.String`
  Shape {
    pattern: r"(?:[a-zA-Z_][a-zA-Z0-9_]*\.)+[A-Z][a-zA-Z0-9_]*",
    unless_version_follows: true,
    unless_www: true,
  },
  // password reset label line together with the URL line below it
  Shape {
    pattern: r"(?im)(?:パスワード再設定|password\s+reset).*?URL[：:]\s*\n.*",
    unless_version_follows: false,
    unless_www: false,
  },
  // `target=` parameter line
  Shape {
    pattern: r"(?m)target=.*?(?:\n|$)",
    unless_version_follows: false,
    unless_www: false,
  },
];

const LINK_PATTERN: &str = concat!(
  r"(?i)",
  r"(?:https?|ftp)://[^\s<>'\x22]+",
  r"|(?:\d{1,3}\.){3}\d{1,3}(?::\d+)?(?:/[^\s<>'\x22]*)?",
  r"|(?:www\.)?[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?::\d+)?(?:/[^\s<>'\x22]*)?",
);

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

fn tag_regex() -> &'static Regex {
  static REGEX: OnceLock<Regex> = OnceLock::new();
  REGEX.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

fn shape_regexes() -> &'static [Regex] {
  static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
  REGEXES.get_or_init(|| {
    PROTECTED_SHAPES
      .iter()
      .map(|s| Regex::new(s.pattern).expect("valid protected shape"))
      .collect()
  })
}

fn link_regex() -> &'static Regex {
  static REGEX: OnceLock<Regex> = OnceLock::new();
  REGEX.get_or_init(|| Regex::new(LINK_PATTERN).expect("valid link regex"))
}

fn ipv4_prefix_regex() -> &'static Regex {
  static REGEX: OnceLock<Regex> = OnceLock::new();
  REGEX.get_or_init(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("valid ipv4 regex"))
}

/// Rewrite bare links in `text` as `<a href=".." target="_blank">..</a>`.
pub fn linkify(text: &str) -> String {
  if tag_regex().is_match(text) {
    return text.to_string();
  }
  let mut vault = Vault::default();
  let guarded = vault.protect(text);
  let linked = link_pass(&guarded);
  vault.restore(linked)
}

/// Protected substrings, indexed by placeholder number.
#[derive(Default)]
struct Vault {
  saved: Vec<String>,
}

impl Vault {
  fn protect(&mut self, text: &str) -> String {
    let mut current = text.to_string();
    for (shape, re) in PROTECTED_SHAPES.iter().zip(shape_regexes()) {
      let mut out = String::with_capacity(current.len());
      let mut last = 0;
      for m in re.find_iter(&current) {
        if shape.unless_version_follows && version_follows(&current[m.end()..]) {
          continue;
        }
        if shape.unless_www && starts_with_www(m.as_str()) {
          continue;
        }
        out.push_str(&current[last..m.start()]);
        out.push_str(&self.stash(m.as_str()));
        last = m.end();
      }
      out.push_str(&current[last..]);
      current = out;
    }
    current
  }

  fn stash(&mut self, original: &str) -> String {
    let placeholder = format!("{PLACEHOLDER_OPEN}{}{PLACEHOLDER_CLOSE}", self.saved.len());
    self.saved.push(original.to_string());
    placeholder
  }

  fn restore(self, mut text: String) -> String {
    // later placeholders may enclose earlier ones
    for (i, original) in self.saved.iter().enumerate().rev() {
      let placeholder = format!("{PLACEHOLDER_OPEN}{i}{PLACEHOLDER_CLOSE}");
      text = text.replace(&placeholder, original);
    }
    text
  }
}

fn version_follows(rest: &str) -> bool {
  let mut chars = rest.chars();
  chars.next() == Some('.') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn starts_with_www(s: &str) -> bool {
  s.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("www."))
}

fn link_pass(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut last = 0;
  for m in link_regex().find_iter(text) {
    if !at_token_start(text, m.start()) {
      continue;
    }
    let (link, trailing) = split_trailing_punctuation(m.as_str());
    if link.is_empty() {
      continue;
    }
    out.push_str(&text[last..m.start()]);
    out.push_str(&format!(
      r#"<a href="{}" target="_blank">{}</a>"#,
      html_escape(&normalize_href(link)),
      html_escape(link)
    ));
    out.push_str(trailing);
    last = m.end();
  }
  out.push_str(&text[last..]);
  out
}

/// A link may not begin in the middle of a word, hostname or mail address.
fn at_token_start(text: &str, start: usize) -> bool {
  match text[..start].chars().next_back() {
    None => true,
    Some(c) => !(c.is_alphanumeric() || matches!(c, '@' | '.' | '-' | '_' | '/')),
  }
}

/// Split off trailing sentence punctuation and any `)` left unbalanced in the link.
fn split_trailing_punctuation(s: &str) -> (&str, &str) {
  let mut link = s;
  loop {
    link = link.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    let unbalanced = link.matches(')').count() > link.matches('(').count();
    match link.strip_suffix(')') {
      Some(rest) if unbalanced => link = rest,
      _ => break,
    }
  }
  s.split_at(link.len())
}

fn normalize_href(link: &str) -> String {
  let lower = link.to_ascii_lowercase();
  let has_scheme = ["http://", "https://", "ftp://"]
    .iter()
    .any(|scheme| lower.starts_with(scheme));
  if !has_scheme && (lower.starts_with("www.") || ipv4_prefix_regex().is_match(link)) {
    format!("http://{link}")
  } else {
    link.to_string()
  }
}
