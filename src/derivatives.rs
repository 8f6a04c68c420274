use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::cli::RenderDerivativesArgs;
use crate::formats::Derivative;

pub const INPUT_REL_PATH: &str = "derivatives/derivatives.json";
pub const OUTPUT_REL_PATH: &str = "derivatives/index.html";

const PAGE_TITLE: &str = "derivatives";
const PAGE_DESCRIPTION: &str = "Projects downstream of this one, and how to get listed.";

#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level JSON must be an object")]
    NotAnObject,

    #[error("derivatives must be a list")]
    NotAList,

    #[error("derivatives[{index}] must be an object")]
    ItemNotAnObject { index: usize },

    #[error("derivatives[{index}]: missing required key: {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("derivatives[{index}]: {field} must be a non-empty string")]
    InvalidField { index: usize, field: &'static str },
}

pub fn run(args: RenderDerivativesArgs) -> anyhow::Result<()> {
    let site_root = PathBuf::from(&args.site_root);
    let json_path = site_root.join(INPUT_REL_PATH);
    let out_path = site_root.join(OUTPUT_REL_PATH);

    let derivatives = load_derivatives(&json_path)?;
    let html = render_html(&derivatives, Utc::now().date_naive());

    std::fs::write(&out_path, html)
        .with_context(|| format!("write derivatives page: {}", out_path.display()))?;

    println!("Wrote {OUTPUT_REL_PATH} ({} entries)", derivatives.len());
    Ok(())
}

pub fn load_derivatives(json_path: &Path) -> anyhow::Result<Vec<Derivative>> {
    let contents = std::fs::read_to_string(json_path)
        .with_context(|| format!("read derivatives: {}", json_path.display()))?;
    let derivatives = parse_derivatives(&contents)
        .with_context(|| format!("load derivatives: {}", json_path.display()))?;
    Ok(derivatives)
}

/// Validates every record and returns them sorted case-insensitively by name.
/// Any invalid record rejects the whole document.
pub fn parse_derivatives(contents: &str) -> Result<Vec<Derivative>, DerivativeError> {
    let data: Value = serde_json::from_str(contents)?;
    let Value::Object(data) = data else {
        return Err(DerivativeError::NotAnObject);
    };

    let items = match data.get("derivatives") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(DerivativeError::NotAList),
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, raw) in items.iter().enumerate() {
        let Value::Object(raw) = raw else {
            return Err(DerivativeError::ItemNotAnObject { index });
        };
        out.push(Derivative {
            name: require_str(raw, index, "name")?,
            url: require_str(raw, index, "url")?,
            desc: require_str(raw, index, "desc")?,
        });
    }

    out.sort_by_cached_key(|d| d.name.to_lowercase());
    Ok(out)
}

fn require_str(
    obj: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, DerivativeError> {
    let value = obj
        .get(field)
        .ok_or(DerivativeError::MissingField { index, field })?;
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_owned()),
        _ => Err(DerivativeError::InvalidField { index, field }),
    }
}

pub fn render_html(derivatives: &[Derivative], generated_on: NaiveDate) -> String {
    let updated = generated_on.format("%Y-%m-%d");

    let (empty_note, items) = if derivatives.is_empty() {
        (
            "  <p class=\"mini\">(empty for now; first movers get permanent placement.)</p>\n",
            "    <li><em>none yet</em></li>".to_owned(),
        )
    } else {
        let items = derivatives
            .iter()
            .map(|d| {
                format!(
                    "    <li><a href=\"{}\">{}</a> — {}</li>",
                    html_escape(&d.url),
                    html_escape(&d.name),
                    html_escape(&d.desc)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        ("", items)
    };

    format!(
        r#"<!DOCTYPE html>
<!--
  GENERATED FILE
  - Source: {INPUT_REL_PATH}
  - Renderer: sitekit render-derivatives
  - Updated: {updated} (UTC)

  Edit the JSON, then re-run the renderer.
-->
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <link rel="icon" href="../favicon.svg" type="image/svg+xml">

  <meta property="og:title" content="{PAGE_TITLE}">
  <meta property="og:description" content="{PAGE_DESCRIPTION}">
  <meta property="og:type" content="website">

  <meta name="twitter:card" content="summary">
  <meta name="twitter:title" content="{PAGE_TITLE}">
  <meta name="twitter:description" content="{PAGE_DESCRIPTION}">

  <title>derivatives</title>
  <style>
    body {{ font-family: monospace; max-width: 640px; margin: 80px auto; padding: 0 20px; background: #0d0d0d; color: #e0e0e0; line-height: 1.7; }}
    h1 {{ font-size: 1.2rem; color: #fff; margin-bottom: 0; }}
    .sub {{ color: #666; font-size: 0.85rem; margin-bottom: 40px; }}
    h2 {{ font-size: 0.9rem; color: #888; text-transform: uppercase; letter-spacing: 0.1em; margin-top: 40px; }}
    a {{ color: #7eb8f7; text-decoration: none; }}
    a:hover {{ text-decoration: underline; }}
    .mini {{ color: #777; font-size: 0.85rem; }}
    .rule {{ background: #161616; border: 1px solid #2a2a2a; padding: 10px 14px; margin: 14px 0; font-size: 0.85rem; color: #aaa; }}
    .rule strong {{ color: #e0e0e0; }}
    ul {{ padding-left: 18px; }}
    li {{ margin: 8px 0; }}
  </style>
</head>
<body>
  <h1>derivatives</h1>
  <div class="sub">projects downstream of this one</div>

  <p class="mini">
    <a href="../">home</a> ·
    <a href="./">derivatives</a>
  </p>

  <div class="rule">
    <strong>how to get listed</strong><br>
    link back to the <a href="../">home page</a> from your project, then send
    its name, link and a one-line description to be added to
    <code>{INPUT_REL_PATH}</code>.
  </div>

  <h2>Derivatives</h2>
{empty_note}  <ul>
{items}
  </ul>

  <h2>Back</h2>
  <p><a href="../">← back home</a></p>
</body>
</html>
"#
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
