//! Inline XBRL fact, context and unit extraction.
//!
//! Every tag is handled on its own, so the order of elements in the document
//! does not matter. Facts are linked to contexts only after all instance
//! documents of a filing have been merged.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;

use html_escape::decode_html_entities;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Node, ParsingOptions};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::numeric::normalize_numeric;
use super::text::{infer_format, normalize_non_numeric, InferredFormat};
use crate::core::error::{Result, XbrlError};

pub const XBRLI_NS: &str = "http://www.xbrl.org/2003/instance";
pub const XBRLDI_NS: &str = "http://xbrl.org/2006/xbrldi";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Securities codes carry a trailing check digit (`72030`); only the first
/// four characters identify the issuer.
pub const SECURITIES_CODE_LEN: usize = 4;

static NAMED_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NumericFact {
    pub document: String,
    pub context_ref: Option<String>,
    pub prefix: Option<String>,
    pub concept: Option<String>,
    pub decimals: Option<String>,
    pub format: Option<String>,
    pub scale: Option<i32>,
    pub sign: Option<String>,
    pub unit_ref: Option<String>,
    pub nil: bool,
    pub raw_text: String,
    pub value: Option<Decimal>,
    pub display: Option<String>,
    pub display_scale: Option<String>,
    pub context_missing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TextFact {
    pub document: String,
    pub context_ref: Option<String>,
    pub prefix: Option<String>,
    pub concept: Option<String>,
    pub escape: bool,
    pub nil: bool,
    pub format: Option<String>,
    /// `None` for escaped facts, whose content is markup.
    pub raw_text: Option<String>,
    pub value: Option<String>,
    pub inferred_format: Option<InferredFormat>,
    pub normalization_failed: bool,
    pub context_missing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Context {
    pub id: String,
    pub entity_scheme: Option<String>,
    pub entity: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub instant: Option<String>,
}

/// One scenario/segment member of a context. Typed members keep their text
/// content as the member.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DimensionMember {
    pub context_id: String,
    pub dimension: Option<String>,
    pub member: Option<String>,
    pub typed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitRow {
    pub id: String,
    pub measure: Option<String>,
    pub numerator: Option<String>,
    pub denominator: Option<String>,
}

/// Facts, contexts and units of one or more instance documents.
#[derive(Clone, Debug, Default)]
pub struct InstanceDocument {
    pub numeric: Vec<NumericFact>,
    pub text: Vec<TextFact>,
    pub contexts: Vec<Context>,
    pub dimensions: Vec<DimensionMember>,
    pub units: Vec<UnitRow>,
}

impl InstanceDocument {
    pub fn merge(&mut self, other: InstanceDocument) {
        self.numeric.extend(other.numeric);
        self.text.extend(other.text);
        self.contexts.extend(other.contexts);
        self.dimensions.extend(other.dimensions);
        self.units.extend(other.units);
    }

    /// Flags facts whose context reference names no known context. They are
    /// kept, not dropped.
    pub fn mark_orphans(&mut self) -> usize {
        let ids: HashSet<&str> = self.contexts.iter().map(|c| c.id.as_str()).collect();
        let known = |r: &Option<String>| r.as_deref().map(|r| ids.contains(r)).unwrap_or(false);

        let mut orphans = 0;
        for fact in &mut self.numeric {
            fact.context_missing = !known(&fact.context_ref);
            orphans += fact.context_missing as usize;
        }
        for fact in &mut self.text {
            fact.context_missing = !known(&fact.context_ref);
            orphans += fact.context_missing as usize;
        }
        if orphans > 0 {
            warn!("{} facts reference a context that is not declared", orphans);
        }
        orphans
    }

    /// Local names of every concept that carries a fact.
    pub fn concepts(&self) -> HashSet<&str> {
        self.numeric
            .iter()
            .filter_map(|f| f.concept.as_deref())
            .chain(self.text.iter().filter_map(|f| f.concept.as_deref()))
            .collect()
    }
}

fn is_ix(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .map(|ns| ns.ends_with("inlineXBRL"))
            .unwrap_or(false)
}

fn is_xbrli(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.has_tag_name((XBRLI_NS, name))
}

fn attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn trimmed_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node.descendants().filter_map(|n| n.text()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Text content with `ix:exclude` subtrees left out.
fn fact_text(node: Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
        } else if child.is_element() && !is_ix(&child, "exclude") {
            fact_text(child, out);
        }
    }
}

fn split_qname(name: Option<&str>) -> (Option<String>, Option<String>) {
    match name {
        Some(n) => match n.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), Some(local.to_string())),
            None => (None, Some(n.to_string())),
        },
        None => (None, None),
    }
}

fn is_nil(node: Node<'_, '_>) -> bool {
    node.attribute((XSI_NS, "nil")).map(|v| v == "true").unwrap_or(false)
}

fn numeric_fact(node: Node<'_, '_>, document: &str) -> NumericFact {
    let (prefix, concept) = split_qname(node.attribute("name"));
    let mut raw = String::new();
    fact_text(node, &mut raw);
    let raw_text = raw.trim().to_string();

    let format = attr(node, "format");
    let sign = attr(node, "sign");
    let scale = node.attribute("scale").and_then(|s| s.trim().parse::<i32>().ok());
    let unit_ref = attr(node, "unitRef");
    let nil = is_nil(node);

    let normalized = if nil {
        None
    } else {
        Some(normalize_numeric(
            &raw_text,
            format.as_deref(),
            sign.as_deref(),
            scale,
            unit_ref.as_deref(),
        ))
    };

    NumericFact {
        document: document.to_string(),
        context_ref: attr(node, "contextRef"),
        prefix,
        concept,
        decimals: attr(node, "decimals"),
        format,
        scale,
        sign,
        unit_ref,
        nil,
        raw_text,
        value: normalized.as_ref().and_then(|n| n.value),
        display: normalized.as_ref().and_then(|n| n.display.clone()),
        display_scale: normalized
            .as_ref()
            .and_then(|n| n.display_scale)
            .map(str::to_string),
        context_missing: false,
    }
}

fn text_fact(node: Node<'_, '_>, document: &str) -> TextFact {
    let (prefix, concept) = split_qname(node.attribute("name"));
    let escape = node
        .attribute("escape")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let nil = is_nil(node);
    let format = attr(node, "format");

    let mut content = String::new();
    fact_text(node, &mut content);

    let mut fact = TextFact {
        document: document.to_string(),
        context_ref: attr(node, "contextRef"),
        prefix,
        concept,
        escape,
        nil,
        format,
        raw_text: None,
        value: None,
        inferred_format: None,
        normalization_failed: false,
        context_missing: false,
    };

    if nil {
        return fact;
    }

    if escape {
        let value = WHITESPACE.replace_all(content.trim(), " ").into_owned();
        fact.value = Some(value);
        return fact;
    }

    let normalized = normalize_non_numeric(&content, fact.format.as_deref());
    let mut value = normalized.value;
    if fact.concept.as_deref() == Some("SecuritiesCode") {
        value = value.chars().take(SECURITIES_CODE_LEN).collect();
    }
    if fact.format.is_none() {
        fact.inferred_format = Some(infer_format(&value));
    }
    fact.raw_text = Some(content.trim().to_string());
    fact.value = Some(value);
    fact.normalization_failed = normalized.failed;
    fact
}

fn context(node: Node<'_, '_>, dimensions: &mut Vec<DimensionMember>) -> Option<Context> {
    let id = node.attribute("id")?.to_string();
    let identifier = node.descendants().find(|n| is_xbrli(n, "identifier"));
    let period_value = |name: &str| {
        node.descendants()
            .find(|n| is_xbrli(n, name))
            .and_then(trimmed_text)
    };

    for member in node.descendants().filter(|n| n.is_element()) {
        let typed = if member.has_tag_name((XBRLDI_NS, "explicitMember")) {
            false
        } else if member.has_tag_name((XBRLDI_NS, "typedMember")) {
            true
        } else {
            continue;
        };
        dimensions.push(DimensionMember {
            context_id: id.clone(),
            dimension: attr(member, "dimension"),
            member: trimmed_text(member),
            typed,
        });
    }

    Some(Context {
        entity_scheme: identifier.and_then(|n| attr(n, "scheme")),
        entity: identifier.and_then(trimmed_text),
        start_date: period_value("startDate"),
        end_date: period_value("endDate"),
        instant: period_value("instant"),
        id,
    })
}

fn unit(node: Node<'_, '_>) -> Option<UnitRow> {
    let id = node.attribute("id")?.to_string();
    let measure_in = |parent: &str| {
        node.descendants()
            .find(|n| is_xbrli(n, parent))
            .and_then(|p| p.children().find(|n| is_xbrli(n, "measure")))
            .and_then(trimmed_text)
    };
    let direct = node
        .children()
        .find(|n| is_xbrli(n, "measure"))
        .and_then(trimmed_text);

    Some(UnitRow {
        id,
        measure: direct,
        numerator: measure_in("unitNumerator"),
        denominator: measure_in("unitDenominator"),
    })
}

/// Replaces HTML named entities with numeric references so the XHTML parses
/// as XML. Names HTML does not know are kept as literal text.
pub fn prepare_xhtml(content: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(content, |caps: &regex::Captures| {
        let entity = &caps[0];
        if XML_ENTITIES.contains(&&caps[1]) {
            return entity.to_string();
        }
        let decoded = decode_html_entities(entity);
        if decoded == entity {
            return format!("&amp;{};", &caps[1]);
        }
        decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
    })
}

/// Parses one iXBRL document. `path` names the source document and is used
/// for error reporting.
pub fn parse_instance_str(content: &str, path: &Path) -> Result<InstanceDocument> {
    let prepared = prepare_xhtml(content);
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(prepared.as_ref(), options).map_err(|e| XbrlError::Xml {
        path: path.to_path_buf(),
        source: e,
    })?;
    let document = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut instance = InstanceDocument::default();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if is_ix(&node, "nonFraction") {
            instance.numeric.push(numeric_fact(node, &document));
        } else if is_ix(&node, "nonNumeric") {
            instance.text.push(text_fact(node, &document));
        } else if is_xbrli(&node, "context") {
            if let Some(ctx) = context(node, &mut instance.dimensions) {
                instance.contexts.push(ctx);
            }
        } else if is_xbrli(&node, "unit") {
            if let Some(u) = unit(node) {
                instance.units.push(u);
            }
        }
    }

    debug!(
        "Extracted {} numeric facts, {} text facts, {} contexts from {}",
        instance.numeric.len(),
        instance.text.len(),
        instance.contexts.len(),
        document
    );
    Ok(instance)
}

pub fn parse_instance(path: &Path) -> Result<InstanceDocument> {
    let content = std::fs::read_to_string(path)?;
    parse_instance_str(&content, path)
}

/// Parses every instance document of a filing and links facts to contexts.
pub fn parse_instances<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<InstanceDocument> {
    let mut merged = InstanceDocument::default();
    for path in paths {
        merged.merge(parse_instance(path)?);
    }
    merged.mark_orphans();
    Ok(merged)
}
