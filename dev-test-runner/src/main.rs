//! Smoke run: generate the demo document, read it back and re-validate it.
use anyhow::Context;
use openapi_reflect::Document;
use openapi_reflect::demo;

fn main() -> anyhow::Result<()> {
    let mut api = demo::messages_api(demo::default_options());
    let json_source = api.json_pretty().context("generate")?;

    let doc = Document::from_json_slice(json_source.as_bytes()).context("decode generated document")?;
    doc.validate().context("re-validate decoded document")?;

    let yaml_source = doc.to_yaml()?;
    let from_yaml = Document::from_yaml(&yaml_source).context("decode yaml")?;
    anyhow::ensure!(from_yaml == doc, "yaml round trip changed the document");

    eprintln!("—— {} {} ——", doc.info.title, doc.info.version);
    for (pattern, item) in &doc.paths {
        for (method, op) in item.operations() {
            eprintln!("{method:<7} {pattern} ({} parameters, {} responses)", op.parameters.len(), op.responses.len());
        }
    }
    for name in doc.components.schemas.keys() {
        eprintln!("component {name}");
    }
    println!("{json_source}");
    Ok(())
}
