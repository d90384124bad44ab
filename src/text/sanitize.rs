//! Blank-line cleanup for extracted plain-text bodies.

/// Strip trailing whitespace per line, drop leading/trailing blank lines,
/// and collapse runs of interior blank lines to one.
pub fn sanitize(text: &str) -> String {
  let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

  let Some(start) = lines.iter().position(|l| !l.is_empty()) else {
    return String::new();
  };
  // `start` exists, so a last non-blank line does too
  let end = lines.iter().rposition(|l| !l.is_empty()).unwrap_or(start);

  let mut out: Vec<&str> = Vec::with_capacity(end - start + 1);
  let mut prev_blank = false;
  for line in &lines[start..=end] {
    let blank = line.is_empty();
    if !(blank && prev_blank) {
      out.push(line);
    }
    prev_blank = blank;
  }
  out.join("\n")
}
