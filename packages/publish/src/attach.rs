//! Runtime attachment into published HTML.
//!
//! The page ends up with exactly one runtime `<script>` tag and exactly one
//! config block:
//!
//! ```html
//! <script id="bugence-dve-runtime" src="/js/dynamic-ve-runtime.js" defer></script>
//! <script id="bugence-dve-config" type="application/json">{"overlayPath":...}</script>
//! </body>
//! ```

use crate::error::PublishResult;
use dve_model::{RuntimeConfig, CONFIG_SCRIPT_ID, RUNTIME_SCRIPT_ID};
use regex::Regex;

/// Rewrite `html` to reference the runtime and carry `config`.
///
/// Old config blocks are removed by id. The runtime tag is only added when
/// absent. Blank HTML is returned unchanged.
pub fn attach_runtime(html: &str, runtime_src: &str, config: &RuntimeConfig) -> PublishResult<String> {
    if html.trim().is_empty() {
        return Ok(html.to_string());
    }

    let config_block = Regex::new(&format!(
        r#"(?is)<script\s+id=["']{}["'][^>]*>.*?</script>"#,
        regex::escape(CONFIG_SCRIPT_ID)
    ))?;
    let runtime_present = Regex::new(&format!(
        r#"(?i)id=["']{}["']"#,
        regex::escape(RUNTIME_SCRIPT_ID)
    ))?;
    let body_close = Regex::new(r"(?i)</body\s*>")?;

    let mut cleaned = config_block.replace_all(html, "").into_owned();

    // `</` would end the script element early; `<\/` is the same JSON string.
    let json = serde_json::to_string(config)?.replace("</", "<\\/");
    let mut tags = String::new();
    if !runtime_present.is_match(&cleaned) {
        tags.push_str(&format!(
            r#"<script id="{}" src="{}" defer></script>"#,
            RUNTIME_SCRIPT_ID,
            escape_attr(runtime_src)
        ));
    }
    tags.push_str(&format!(
        r#"<script id="{}" type="application/json">{}</script>"#,
        CONFIG_SCRIPT_ID, json
    ));

    let close_at = body_close.find_iter(&cleaned).last().map(|m| m.start());
    match close_at {
        Some(at) => cleaned.insert_str(at, &tags),
        None => cleaned.push_str(&tags),
    }
    Ok(cleaned)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
