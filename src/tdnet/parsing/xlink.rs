//! Generic XLink extended-link parsing.
//!
//! Every linkbase kind shares the same shape: extended-link containers holding
//! locators, arcs and (for labels) resources. A label is only unique inside
//! its container, so every join below keys on `(container role, label)`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, XbrlError};

pub const LINK_NS: &str = "http://www.xbrl.org/2003/linkbase";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkbaseKind {
    Label,
    Calculation,
    Definition,
    Presentation,
}

impl LinkbaseKind {
    pub const ALL: [LinkbaseKind; 4] = [
        LinkbaseKind::Label,
        LinkbaseKind::Calculation,
        LinkbaseKind::Definition,
        LinkbaseKind::Presentation,
    ];

    /// Local name of the extended-link container element.
    pub fn container_tag(&self) -> &'static str {
        match self {
            LinkbaseKind::Label => "labelLink",
            LinkbaseKind::Calculation => "calculationLink",
            LinkbaseKind::Definition => "definitionLink",
            LinkbaseKind::Presentation => "presentationLink",
        }
    }

    pub fn arc_tag(&self) -> &'static str {
        match self {
            LinkbaseKind::Label => "labelArc",
            LinkbaseKind::Calculation => "calculationArc",
            LinkbaseKind::Definition => "definitionArc",
            LinkbaseKind::Presentation => "presentationArc",
        }
    }

    /// `xlink:role` of a `linkbaseRef` pointing at this kind of linkbase.
    pub fn ref_role(&self) -> &'static str {
        match self {
            LinkbaseKind::Label => "http://www.xbrl.org/2003/role/labelLinkbaseRef",
            LinkbaseKind::Calculation => "http://www.xbrl.org/2003/role/calculationLinkbaseRef",
            LinkbaseKind::Definition => "http://www.xbrl.org/2003/role/definitionLinkbaseRef",
            LinkbaseKind::Presentation => "http://www.xbrl.org/2003/role/presentationLinkbaseRef",
        }
    }

    pub fn from_ref_role(role: &str) -> Option<LinkbaseKind> {
        Self::ALL.into_iter().find(|k| k.ref_role() == role)
    }
}

impl fmt::Display for LinkbaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkbaseKind::Label => "label",
            LinkbaseKind::Calculation => "calculation",
            LinkbaseKind::Definition => "definition",
            LinkbaseKind::Presentation => "presentation",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleRef {
    pub role_uri: Option<String>,
    pub href: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArcroleRef {
    pub arcrole_uri: Option<String>,
    pub href: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub container_role: Option<String>,
    pub schema: Option<String>,
    pub concept: Option<String>,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub container_role: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub arcrole: Option<String>,
    pub order: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub container_role: Option<String>,
    pub label: Option<String>,
    pub role: Option<String>,
    pub lang: Option<String>,
    pub text: Option<String>,
}

/// A concept label, after joining arcs to locators and label resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub schema: Option<String>,
    pub concept: Option<String>,
    pub label_role: Option<String>,
    pub lang: Option<String>,
    pub text: Option<String>,
}

/// A concept-to-concept relationship from a calculation, definition or
/// presentation linkbase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub role: Option<String>,
    pub from_schema: Option<String>,
    pub from_concept: Option<String>,
    pub to_schema: Option<String>,
    pub to_concept: Option<String>,
    pub arcrole: Option<String>,
    pub order: Option<f64>,
    pub weight: Option<f64>,
}

/// Raw XLink tables extracted from one linkbase file.
#[derive(Clone, Debug, Default)]
pub struct ParsedLinkbase {
    pub path: PathBuf,
    role_refs: Option<Vec<RoleRef>>,
    arcrole_refs: Option<Vec<ArcroleRef>>,
    pub locators: Vec<Locator>,
    pub arcs: Vec<Arc>,
    pub resources: Vec<Resource>,
}

type Key<'a> = (Option<&'a str>, &'a str);

impl ParsedLinkbase {
    /// `roleRef` declarations. A linkbase without any is reported as
    /// `TagNotFound`, which is not the same as an empty list.
    pub fn roles(&self) -> Result<&[RoleRef]> {
        self.role_refs.as_deref().ok_or_else(|| XbrlError::TagNotFound {
            tag: "roleRef".to_string(),
            path: self.path.clone(),
        })
    }

    pub fn arcroles(&self) -> Result<&[ArcroleRef]> {
        self.arcrole_refs.as_deref().ok_or_else(|| XbrlError::TagNotFound {
            tag: "arcroleRef".to_string(),
            path: self.path.clone(),
        })
    }

    fn locator_index(&self) -> HashMap<Key<'_>, Vec<&Locator>> {
        let mut index: HashMap<Key<'_>, Vec<&Locator>> = HashMap::new();
        for loc in &self.locators {
            if let Some(label) = loc.label.as_deref() {
                index
                    .entry((loc.container_role.as_deref(), label))
                    .or_default()
                    .push(loc);
            }
        }
        index
    }

    fn resource_index(&self) -> HashMap<Key<'_>, Vec<&Resource>> {
        let mut index: HashMap<Key<'_>, Vec<&Resource>> = HashMap::new();
        for res in &self.resources {
            if let Some(label) = res.label.as_deref() {
                index
                    .entry((res.container_role.as_deref(), label))
                    .or_default()
                    .push(res);
            }
        }
        index
    }

    /// `arcs ⋈ locators(from) ⋈ resources(to)`, scoped to the container.
    pub fn labels(&self) -> Vec<LabelRow> {
        let locators = self.locator_index();
        let resources = self.resource_index();
        let mut rows = Vec::new();

        for arc in &self.arcs {
            let role = arc.container_role.as_deref();
            let (Some(from), Some(to)) = (arc.from.as_deref(), arc.to.as_deref()) else {
                continue;
            };
            let (Some(locs), Some(ress)) = (locators.get(&(role, from)), resources.get(&(role, to))) else {
                continue;
            };
            for (loc, res) in locs.iter().cartesian_product(ress.iter()) {
                rows.push(LabelRow {
                    schema: loc.schema.clone(),
                    concept: loc.concept.clone(),
                    label_role: res.role.clone(),
                    lang: res.lang.clone(),
                    text: res.text.clone(),
                });
            }
        }

        rows
    }

    /// `arcs ⋈ locators(from) ⋈ locators(to)`, scoped to the container.
    pub fn edges(&self) -> Vec<EdgeRow> {
        let locators = self.locator_index();
        let mut rows = Vec::new();

        for arc in &self.arcs {
            let role = arc.container_role.as_deref();
            let (Some(from), Some(to)) = (arc.from.as_deref(), arc.to.as_deref()) else {
                continue;
            };
            let (Some(froms), Some(tos)) = (locators.get(&(role, from)), locators.get(&(role, to))) else {
                continue;
            };
            for (f, t) in froms.iter().cartesian_product(tos.iter()) {
                rows.push(EdgeRow {
                    role: arc.container_role.clone(),
                    from_schema: f.schema.clone(),
                    from_concept: f.concept.clone(),
                    to_schema: t.schema.clone(),
                    to_concept: t.concept.clone(),
                    arcrole: arc.arcrole.clone(),
                    order: arc.order,
                    weight: arc.weight,
                });
            }
        }

        rows
    }

    /// Arcs with an endpoint that names nothing in their own container.
    pub fn dangling_arcs(&self) -> Vec<&Arc> {
        let locators = self.locator_index();
        let resources = self.resource_index();
        let known = |role: Option<&str>, label: Option<&str>| match label {
            Some(l) => locators.contains_key(&(role, l)) || resources.contains_key(&(role, l)),
            None => false,
        };

        self.arcs
            .iter()
            .filter(|a| {
                let role = a.container_role.as_deref();
                !known(role, a.from.as_deref()) || !known(role, a.to.as_deref())
            })
            .collect()
    }
}

fn xlink(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute((XLINK_NS, name)).map(str::to_string)
}

fn is_link(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.has_tag_name((LINK_NS, name))
}

/// Splits `path/jppfs_cor_2022-11-01.xsd#jppfs_cor_AssetsAbstract` into the
/// schema file name and the concept local name. Element ids are
/// `<prefix>_<Name>`; taxonomy concept names carry no underscore, so the name
/// is whatever follows the last one.
pub fn split_href(href: &str) -> (Option<String>, Option<String>) {
    let (path, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (href, None),
    };
    let schema = path
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let concept = fragment.filter(|f| !f.is_empty()).map(|f| match f.rsplit_once('_') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => f.to_string(),
    });
    (schema, concept)
}

fn parse_float(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

/// Parses linkbase text. `path` is only used for error reporting.
pub fn parse_linkbase_str(kind: LinkbaseKind, content: &str, path: &Path) -> Result<ParsedLinkbase> {
    let doc = roxmltree::Document::parse(content).map_err(|e| XbrlError::Xml {
        path: path.to_path_buf(),
        source: e,
    })?;
    let root = doc.root_element();

    let role_refs: Vec<RoleRef> = root
        .descendants()
        .filter(|n| is_link(n, "roleRef"))
        .map(|n| RoleRef {
            role_uri: n.attribute("roleURI").map(str::to_string),
            href: xlink(n, "href"),
        })
        .collect();
    let arcrole_refs: Vec<ArcroleRef> = root
        .descendants()
        .filter(|n| is_link(n, "arcroleRef"))
        .map(|n| ArcroleRef {
            arcrole_uri: n.attribute("arcroleURI").map(str::to_string),
            href: xlink(n, "href"),
        })
        .collect();

    let mut parsed = ParsedLinkbase {
        path: path.to_path_buf(),
        role_refs: (!role_refs.is_empty()).then_some(role_refs),
        arcrole_refs: (!arcrole_refs.is_empty()).then_some(arcrole_refs),
        ..Default::default()
    };

    for container in root.descendants().filter(|n| is_link(n, kind.container_tag())) {
        let container_role = xlink(container, "role");

        for child in container.children().filter(|n| n.is_element()) {
            if is_link(&child, "loc") {
                let (schema, concept) = match child.attribute((XLINK_NS, "href")) {
                    Some(href) => split_href(href),
                    None => (None, None),
                };
                parsed.locators.push(Locator {
                    container_role: container_role.clone(),
                    schema,
                    concept,
                    label: xlink(child, "label"),
                });
            } else if is_link(&child, kind.arc_tag()) {
                parsed.arcs.push(Arc {
                    container_role: container_role.clone(),
                    from: xlink(child, "from"),
                    to: xlink(child, "to"),
                    arcrole: xlink(child, "arcrole"),
                    order: parse_float(child.attribute("order")),
                    weight: parse_float(child.attribute("weight")),
                });
            } else if kind == LinkbaseKind::Label && is_link(&child, "label") {
                let text: String = child
                    .descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect();
                parsed.resources.push(Resource {
                    container_role: container_role.clone(),
                    label: xlink(child, "label"),
                    role: xlink(child, "role"),
                    lang: child.attribute((XML_NS, "lang")).map(str::to_string),
                    text: Some(text.trim().to_string()),
                });
            }
        }
    }

    debug!(
        "Parsed {} linkbase {}: {} locators, {} arcs, {} resources",
        kind,
        path.display(),
        parsed.locators.len(),
        parsed.arcs.len(),
        parsed.resources.len()
    );

    Ok(parsed)
}

pub fn parse_linkbase(kind: LinkbaseKind, path: &Path) -> Result<ParsedLinkbase> {
    let content = std::fs::read_to_string(path)?;
    parse_linkbase_str(kind, &content, path)
}

/// Parsed linkbases of one kind across every contributing file.
#[derive(Clone, Debug)]
pub struct LinkbaseSet {
    pub kind: LinkbaseKind,
    pub files: Vec<ParsedLinkbase>,
}

impl LinkbaseSet {
    pub fn new(kind: LinkbaseKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, parsed: ParsedLinkbase) {
        self.files.push(parsed);
    }

    pub fn aggregate(kind: LinkbaseKind, files: impl IntoIterator<Item = ParsedLinkbase>) -> Self {
        Self {
            kind,
            files: files.into_iter().collect(),
        }
    }

    /// Dangling arcs of every file, paired with the file they came from.
    pub fn dangling_arcs(&self) -> Vec<(&Path, &Arc)> {
        self.files
            .iter()
            .flat_map(|f| f.dangling_arcs().into_iter().map(move |a| (f.path.as_path(), a)))
            .collect()
    }

    /// Role declarations from every file that has any; files without
    /// `roleRef` are skipped.
    pub fn roles(&self) -> Vec<RoleRef> {
        dedup_rows(
            self.files
                .iter()
                .filter_map(|f| f.roles().ok())
                .flat_map(|r| r.iter().cloned()),
        )
    }

    pub fn arcroles(&self) -> Vec<ArcroleRef> {
        dedup_rows(
            self.files
                .iter()
                .filter_map(|f| f.arcroles().ok())
                .flat_map(|r| r.iter().cloned()),
        )
    }

    pub fn locators(&self) -> Vec<Locator> {
        dedup_rows(self.files.iter().flat_map(|f| f.locators.iter().cloned()))
    }

    pub fn arcs(&self) -> Vec<Arc> {
        dedup_rows(self.files.iter().flat_map(|f| f.arcs.iter().cloned()))
    }

    /// Joins are computed per file, since labels never cross files, and then
    /// deduplicated together.
    pub fn labels(&self) -> Vec<LabelRow> {
        dedup_rows(self.files.iter().flat_map(|f| f.labels()))
    }

    pub fn edges(&self) -> Vec<EdgeRow> {
        dedup_rows(self.files.iter().flat_map(|f| f.edges()))
    }
}

/// Full-row deduplication that keeps first-seen order.
pub fn dedup_rows<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Vec<T> {
    rows.into_iter()
        .unique_by(|row| serde_json::to_string(row).unwrap_or_default())
        .collect()
}
