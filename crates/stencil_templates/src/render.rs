//! Post-render transforms.
//!
//! Each rendered body is decoded into a [`Document`], passed through the
//! caller's [`RenderOpt`]s in order and serialized again.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::document::Document;
use crate::error::TemplateResult;

/// Annotation telling Flux not to prune an object.
pub const PRUNE_ANNOTATION: &str = "kustomize.toolkit.fluxcd.io/prune";
pub const PRUNE_ANNOTATION_VALUE: &str = "disabled";

/// Kinds that never receive the prune annotation.
pub const PRUNE_EXCLUDED_KINDS: [&str; 2] = ["Cluster", "GitopsCluster"];

/// Annotation recording the request a set of resources was created from.
pub const CREATE_REQUEST_ANNOTATION: &str = "templates.weave.works/create-request";

/// Annotation recording the paths of the files written for a request.
pub const CREATED_FILES_ANNOTATION: &str = "templates.weave.works/created-files";

/// A mutation applied to every rendered document.
pub trait RenderOpt {
    fn apply(&self, doc: &mut Document) -> TemplateResult<()>;
}

impl<F> RenderOpt for F
where
    F: Fn(&mut Document) -> TemplateResult<()>,
{
    fn apply(&self, doc: &mut Document) -> TemplateResult<()> {
        self(doc)
    }
}

/// Decode one rendered body, apply `opts` in order and re-encode it.
pub fn process_document(bytes: &[u8], opts: &[&dyn RenderOpt]) -> TemplateResult<Vec<u8>> {
    let mut doc = Document::from_yaml(bytes)?;
    for opt in opts {
        opt.apply(&mut doc)?;
    }
    trace!(kind = doc.kind(), name = doc.name(), opts = opts.len(), "Processed document");
    doc.to_yaml()
}

/// Set the namespace of documents that do not already have one.
pub fn in_namespace(namespace: impl Into<String>) -> impl Fn(&mut Document) -> TemplateResult<()> {
    let namespace = namespace.into();
    move |doc: &mut Document| {
        if doc.namespace().is_empty() {
            doc.set_namespace(namespace.clone())?;
        }
        Ok(())
    }
}

/// Add the prune-disabled annotation to everything except the excluded
/// cluster kinds.
pub fn inject_prune_annotation(doc: &mut Document) -> TemplateResult<()> {
    if PRUNE_EXCLUDED_KINDS.contains(&doc.kind()) {
        return Ok(());
    }
    let mut annotations = doc
        .annotations()
        .map_err(|e| e.context("failed trying to inject prune annotation"))?;
    annotations.insert(PRUNE_ANNOTATION.to_string(), PRUNE_ANNOTATION_VALUE.to_string());
    doc.set_annotations(annotations)
}

/// Merge `labels` into each document's labels. New values win on collision.
pub fn inject_labels(labels: BTreeMap<String, String>) -> impl Fn(&mut Document) -> TemplateResult<()> {
    move |doc: &mut Document| {
        if labels.is_empty() {
            return Ok(());
        }
        let mut merged = doc
            .labels()
            .map_err(|e| e.context("failed trying to inject labels"))?;
        merged.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        doc.set_labels(merged)
    }
}

/// Set `annotation` to the JSON encoding of `value` on the first document.
/// Other documents are passed through untouched.
pub fn inject_json_annotation<T: Serialize + ?Sized>(
    mut docs: Vec<Vec<u8>>,
    annotation: &str,
    value: &T,
) -> TemplateResult<Vec<Vec<u8>>> {
    let Some(first) = docs.first_mut() else {
        return Ok(docs);
    };
    let encoded = serde_json::to_string(value)?;
    let mut doc = Document::from_yaml(first)?;
    let mut annotations = doc
        .annotations()
        .map_err(|e| e.context(format!("failed trying to inject {} annotation", annotation)))?;
    annotations.insert(annotation.to_string(), encoded);
    doc.set_annotations(annotations)?;
    *first = doc.to_yaml()?;
    Ok(docs)
}

#[derive(Debug, Serialize)]
struct CreatedFiles<'a> {
    files: &'a [String],
}

/// Record the originating request on the first document.
pub fn stamp_create_request<T: Serialize + ?Sized>(
    docs: Vec<Vec<u8>>,
    request: &T,
) -> TemplateResult<Vec<Vec<u8>>> {
    inject_json_annotation(docs, CREATE_REQUEST_ANNOTATION, request)
}

/// Record the created file paths on the first document.
pub fn stamp_created_files(docs: Vec<Vec<u8>>, files: &[String]) -> TemplateResult<Vec<Vec<u8>>> {
    inject_json_annotation(docs, CREATED_FILES_ANNOTATION, &CreatedFiles { files })
}

/// Join rendered documents into one multi-document YAML stream.
pub fn join_documents(docs: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b"---\n");
        }
        out.extend_from_slice(doc);
        if !doc.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    out
}
