//! Dashboard HTML.

use crate::{app::AppState, util::html_escape};
use axum::{extract::State, response::Html};

pub async fn ui_index(State(state): State<AppState>) -> Html<String> {
  let records = state.cache.snapshot();

  let mut rows = String::new();
  for r in records.iter() {
    let subj = if r.subject.is_empty() { "(no subject)" } else { r.subject.as_str() };
    let to = if r.recipients.is_empty() {
      "(none)".to_string()
    } else {
      r.recipients.join(", ")
    };
    let mut extras = String::new();
    if !r.html_body.is_empty() {
      extras.push_str(&format!(
        "<a class=\"btn\" href=\"/messages/{id}/html\" target=\"_blank\">HTML preview</a>",
        id = r.id
      ));
    }
    for att in &r.attachments {
      extras.push_str(&format!(
        "<a class=\"btn att\" href=\"/attachments/{stored}\" download>{name}</a>",
        stored = html_escape(&att.stored_name),
        name = html_escape(&att.filename)
      ));
    }
    // plain_body is already linkified markup
    rows.push_str(&format!(
      "<tr><td>{when}</td><td>{subj}</td><td>{from}</td><td>{to}</td><td>{ip}</td><td>{app}</td><td><pre>{body}</pre>{extras}</td><td><button onclick=\"deleteOne('{id}')\">Delete</button></td></tr>",
      when = r.received_at,
      subj = html_escape(subj),
      from = html_escape(&r.sender),
      to = html_escape(&to),
      ip = html_escape(&r.client_ip),
      app = html_escape(&r.client_app),
      body = r.plain_body,
      id = r.id,
    ));
  }

  let template = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>mailsink</title>
  <style>
    body { font-family: system-ui, sans-serif; margin: 2rem; }
    h1 { margin: 0 0 1rem 0; }
    table { width: 100%; border-collapse: collapse; }
    th, td { border-bottom: 1px solid #ddd; text-align: left; padding: .5rem; vertical-align: top; }
    pre { white-space: pre-wrap; margin: 0 0 .5rem 0; }
    .actions { margin: 1rem 0; }
    .btn { display: inline-block; margin-right: .5rem; font-size: 12px; }
    code { background: #f6f8fa; padding: .2rem .4rem; border-radius: 4px; }
  </style>
  <script>
    async function clearAll() {
      if (!confirm('Delete all messages?')) return;
      await fetch('/messages', { method: 'DELETE' });
      location.reload();
    }
    async function deleteOne(id) {
      if (!confirm('Delete this message?')) return;
      await fetch('/messages/' + encodeURIComponent(id), { method: 'DELETE' });
      location.reload();
    }
    async function refreshAll() {
      await fetch('/refresh', { method: 'POST' });
      location.reload();
    }
  </script>
</head>
<body>
  <h1>Received mail</h1>
  <p>SMTP: <code>__SMTP__</code> &middot; __COUNT__ message(s) &middot; kept for __RETENTION__ day(s)</p>
  <div class="actions">
    <button onclick="refreshAll()">Refresh</button>
    <button onclick="clearAll()">Clear All</button>
  </div>
  <table>
    <thead><tr><th>Received</th><th>Subject</th><th>From</th><th>To</th><th>Client IP</th><th>Client</th><th>Body / attachments</th><th></th></tr></thead>
    <tbody id="rows">__ROWS__</tbody>
  </table>
</body>
</html>
"#;
  Html(
    template
      .replace("__SMTP__", &html_escape(&state.config.smtp_addr()))
      .replace("__COUNT__", &records.len().to_string())
      .replace("__RETENTION__", &state.config.retention_days.to_string())
      .replace("__ROWS__", &rows),
  )
}
