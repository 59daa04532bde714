//! HTML for the upload form and the rendered report. Self-contained, no external resources.

use crate::pipeline::types::{Report, ReportStatus};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_label(status: ReportStatus) -> (&'static str, &'static str) {
    match status {
        ReportStatus::Success => ("Review complete", "ok"),
        ReportStatus::PartialFailure => ("Review complete with gaps", "partial"),
        ReportStatus::Failure => ("Review failed", "failed"),
    }
}

/// Summary plus the itemized verdict table, in requirement order.
pub fn render_report_html(report: &Report) -> String {
    let (label, class) = status_label(report.status);
    let mut rows = String::new();
    for verdict in &report.verdicts {
        let (mark, row_class) = if verdict.compliant {
            ("Yes", "yes")
        } else {
            ("No", "no")
        };
        rows.push_str(&format!(
            "      <tr class=\"{row_class}\"><td>{}</td><td>{}</td><td>{mark}</td><td>{}</td></tr>\n",
            escape_html(&verdict.requirement),
            escape_html(&verdict.provided),
            escape_html(&verdict.comment),
        ));
    }

    let table = if report.verdicts.is_empty() {
        String::new()
    } else {
        format!(
            "  <p class=\"tally\">{} of {} requirements compliant</p>\n  <table>\n    <thead><tr><th>Requirement</th><th>Provided</th><th>Compliant</th><th>Comment</th></tr></thead>\n    <tbody>\n{rows}    </tbody>\n  </table>\n",
            report.compliant_count, report.total
        )
    };

    format!(
        "{REPORT_HEAD}<body>\n  <h1 class=\"{class}\">{label}</h1>\n  <p class=\"summary\">{summary}</p>\n{table}  <p class=\"meta\">Run {run_id} · {generated}</p>\n  <p><a href=\"/\">Review another submittal</a></p>\n</body>\n</html>\n",
        summary = escape_html(&report.summary),
        run_id = report.run_id,
        generated = report.generated_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

const REPORT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Submittal Review</title>
  <style>
    body { font-family: -apple-system, 'Segoe UI', system-ui, sans-serif; background: #fafaf9; color: #1c1917; padding: 24px; }
    h1.ok { color: #16a34a; } h1.partial { color: #b45309; } h1.failed { color: #dc2626; }
    table { border-collapse: collapse; width: 100%; background: white; }
    th, td { border: 1px solid #d6d3d1; padding: 8px; text-align: left; vertical-align: top; }
    tr.no td:nth-child(3) { color: #dc2626; font-weight: 600; }
    tr.yes td:nth-child(3) { color: #16a34a; font-weight: 600; }
    .meta { color: #78716c; font-size: 12px; }
  </style>
</head>
"#;

pub const UPLOAD_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Submittal Review</title>
  <style>
    * { box-sizing: border-box; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917;
      display: flex; flex-direction: column; align-items: center; padding: 48px 24px;
    }
    form { display: flex; flex-direction: column; gap: 16px; width: 100%; max-width: 420px; }
    label { font-weight: 500; }
    .btn {
      padding: 16px; border-radius: 12px; font-size: 16px; font-weight: 500;
      cursor: pointer; border: none; background: #4a7c59; color: white;
    }
    .btn:disabled { opacity: 0.5; cursor: not-allowed; }
    p { color: #78716c; font-size: 14px; text-align: center; }
  </style>
</head>
<body>
  <h1>Submittal Review</h1>
  <p>Upload the specification section and the submittal. Both may be PDF or plain text.</p>
  <form method="post" action="/review" enctype="multipart/form-data" id="review-form">
    <label for="spec">Specification</label>
    <input type="file" name="spec" id="spec" accept="application/pdf,text/plain" required>
    <label for="submittal">Submittal</label>
    <input type="file" name="submittal" id="submittal" accept="application/pdf,text/plain" required>
    <button class="btn" type="submit" id="submit">Check compliance</button>
  </form>
  <script>
    document.getElementById('review-form').addEventListener('submit', function() {
      var btn = document.getElementById('submit');
      btn.disabled = true;
      btn.textContent = 'Reviewing... this can take a minute';
    });
  </script>
</body>
</html>"#;
