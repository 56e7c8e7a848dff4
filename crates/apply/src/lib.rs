//! Ferry apply: render generated target objects as a multi-document YAML
//! stream suitable for `kubectl apply -f -`.

#![forbid(unsafe_code)]

use std::io::Write;

use anyhow::{Context, Result};
use ferry_core::TargetObject;
use serde_json::Value as Json;
use tracing::debug;

pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Drop server-populated fields so output only carries desired state.
fn strip_noisy(mut v: Json) -> Json {
    if let Some(meta) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("managedFields");
        meta.remove("resourceVersion");
        meta.remove("generation");
        meta.remove("creationTimestamp");
        meta.remove("uid");
    }
    if let Some(obj) = v.as_object_mut() { obj.remove("status"); }
    v
}

/// One YAML document per object, separated by `---`.
pub fn render_manifests(objects: &[TargetObject]) -> Result<String> {
    let mut docs = Vec::with_capacity(objects.len());
    for obj in objects {
        let json = serde_json::to_value(obj).with_context(|| format!("serializing {}", obj.key()))?;
        let yaml = serde_yaml::to_string(&strip_noisy(json)).with_context(|| format!("rendering {} as YAML", obj.key()))?;
        docs.push(yaml);
    }
    debug!(count = docs.len(), "rendered manifests");
    Ok(docs.join(DOCUMENT_SEPARATOR))
}

pub fn write_manifests<W: Write>(mut out: W, objects: &[TargetObject]) -> Result<()> {
    let rendered = render_manifests(objects)?;
    out.write_all(rendered.as_bytes()).context("writing manifests")?;
    out.flush().context("flushing manifests")
}
