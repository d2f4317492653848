use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use url::Url;

use super::fetch::TaxonomyCache;
use super::filing::{find_by_name, list_documents, Origin};
use super::parsing::xlink::LinkbaseKind;
use super::report::{DocumentKind, FileCategory};
use crate::core::config::LabelLanguage;
use crate::core::error::{Result, XbrlError};

/// Specification schemas carry no concept labels; imports into these
/// namespaces are not followed.
const SKIPPED_IMPORT_PREFIXES: &[&str] = &["http://www.xbrl.org/", "http://xbrl.org/", "http://www.w3.org/"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub schema: String,
    pub namespace: Option<String>,
    pub schema_location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkbaseRefRow {
    pub schema: String,
    pub role: Option<String>,
    pub arcrole: Option<String>,
    pub href: Option<String>,
}

/// Declarations found in one schema document, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaDeclarations {
    pub imports: Vec<ImportRow>,
    pub linkbase_refs: Vec<LinkbaseRefRow>,
}

fn attribute_map(e: &BytesStart<'_>, path: &Path) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XbrlError::XmlScan {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XbrlError::XmlScan {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

/// Streams through a schema and collects `import` and `linkbaseRef`
/// declarations. Element declarations, which make up most of a taxonomy
/// schema, are skipped without building a tree.
pub fn scan_schema_str(content: &str, path: &Path) -> Result<SchemaDeclarations> {
    let schema = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut decls = SchemaDeclarations::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"import" => {
                    let mut attrs = attribute_map(&e, path)?;
                    decls.imports.push(ImportRow {
                        schema: schema.clone(),
                        namespace: attrs.remove("namespace"),
                        schema_location: attrs.remove("schemaLocation"),
                    });
                }
                b"linkbaseRef" => {
                    let mut attrs = attribute_map(&e, path)?;
                    decls.linkbase_refs.push(LinkbaseRefRow {
                        schema: schema.clone(),
                        role: attrs.remove("role"),
                        arcrole: attrs.remove("arcrole"),
                        href: attrs.remove("href"),
                    });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(XbrlError::XmlScan {
                    path: path.to_path_buf(),
                    reason: format!("error at position {}: {}", reader.error_position(), e),
                })
            }
            _ => {}
        }
    }

    Ok(decls)
}

pub fn scan_schema(path: &Path) -> Result<SchemaDeclarations> {
    let content = fs::read_to_string(path)?;
    scan_schema_str(&content, path)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    fn key(&self) -> String {
        match self {
            Location::Local(p) => p.display().to_string(),
            Location::Remote(u) => u.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLinkbase {
    pub kind: LinkbaseKind,
    pub href: String,
    pub path: PathBuf,
    pub document: DocumentKind,
    pub origin: Origin,
}

/// An href that could not be turned into a readable local file. `kind` is
/// `None` for a schema, whose linkbases are then unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolutionFailure {
    pub kind: Option<LinkbaseKind>,
    pub href: String,
    pub reason: String,
}

impl ResolutionFailure {
    /// A schema failure counts against every kind.
    pub fn affects(&self, kind: LinkbaseKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }

    pub fn to_error(&self) -> XbrlError {
        XbrlError::resolution(self.href.clone(), &self.reason)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedTaxonomy {
    pub imports: Vec<ImportRow>,
    pub linkbase_refs: Vec<LinkbaseRefRow>,
    /// Every schema document read, local or cached.
    pub schemas: Vec<(PathBuf, Origin)>,
    pub failures: Vec<ResolutionFailure>,
    linkbases: HashMap<LinkbaseKind, Vec<ResolvedLinkbase>>,
}

impl ResolvedTaxonomy {
    /// Linkbases of `kind`, or the first resolution failure affecting that
    /// kind. A kind with any unresolved href, or any unresolved schema,
    /// yields nothing, never a partial list.
    pub fn linkbases(&self, kind: LinkbaseKind) -> Result<&[ResolvedLinkbase]> {
        if let Some(failure) = self.failures.iter().find(|f| f.affects(kind)) {
            return Err(failure.to_error());
        }
        Ok(self.linkbases.get(&kind).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Resolved linkbases of every kind, label kind first.
    pub fn all_linkbases(&self) -> impl Iterator<Item = &ResolvedLinkbase> {
        LinkbaseKind::ALL
            .iter()
            .filter_map(|k| self.linkbases.get(k))
            .flatten()
    }
}

/// Label files in the other language are not resolved at all, so their
/// remote copies are never downloaded.
pub fn accepts_label_file(language: LabelLanguage, href: &str) -> bool {
    let english = href.contains("lab-en");
    match language {
        LabelLanguage::English => english,
        LabelLanguage::Japanese => !english,
    }
}

pub struct TaxonomyResolver<'a> {
    root: &'a Path,
    cache: &'a TaxonomyCache,
    language: LabelLanguage,
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(root: &'a Path, cache: &'a TaxonomyCache, language: LabelLanguage) -> Self {
        Self { root, cache, language }
    }

    /// Turns an href found in the document at `base` into a location.
    pub fn locate(&self, base: &Location, href: &str) -> Result<Location> {
        let href = href.split('#').next().unwrap_or(href);

        if let Ok(url) = Url::parse(href) {
            if url.scheme() == "http" || url.scheme() == "https" {
                return Ok(Location::Remote(url));
            }
            return Err(XbrlError::resolution(href, format!("unsupported scheme '{}'", url.scheme())));
        }

        match base {
            Location::Remote(base_url) => base_url
                .join(href)
                .map(Location::Remote)
                .map_err(|e| XbrlError::resolution(href, e)),
            Location::Local(_) => {
                let file_name = href.rsplit('/').next().unwrap_or(href);
                find_by_name(self.root, file_name)
                    .map(Location::Local)
                    .ok_or_else(|| XbrlError::resolution(href, "no file with that name in the filing"))
            }
        }
    }

    /// Local file for a location, downloading remote ones into the cache.
    pub fn materialize(&self, location: &Location) -> Result<(PathBuf, Origin)> {
        match location {
            Location::Local(p) => Ok((p.clone(), Origin::Local)),
            Location::Remote(u) => Ok((self.cache.resolve(u)?, Origin::Remote)),
        }
    }

    pub fn resolve(&self) -> Result<ResolvedTaxonomy> {
        let mut resolved = ResolvedTaxonomy::default();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(Location, DocumentKind)> = list_documents(self.root)
            .into_iter()
            .filter(|d| d.category == FileCategory::Schema)
            .map(|d| (Location::Local(d.path), d.kind))
            .collect();

        info!("Resolving taxonomy from {} local schemas", queue.len());

        while let Some((location, document)) = queue.pop_front() {
            if !visited.insert(location.key()) {
                continue;
            }

            let (path, origin) = match self.materialize(&location) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Skipping schema {}: {}", location.key(), e);
                    resolved.failures.push(ResolutionFailure {
                        kind: None,
                        href: location.key(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let decls = match scan_schema(&path) {
                Ok(d) => d,
                Err(e) if origin == Origin::Remote => {
                    warn!("Cached schema {} is unreadable: {}", path.display(), e);
                    resolved.failures.push(ResolutionFailure {
                        kind: None,
                        href: location.key(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            resolved.schemas.push((path, origin));

            for import in &decls.imports {
                let Some(href) = import.schema_location.as_deref() else {
                    continue;
                };
                match self.locate(&location, href) {
                    Ok(Location::Remote(url))
                        if SKIPPED_IMPORT_PREFIXES.iter().any(|p| url.as_str().starts_with(p)) =>
                    {
                        debug!("Not following specification schema {}", url);
                    }
                    Ok(next) => queue.push_back((next, document)),
                    Err(e) => resolved.failures.push(ResolutionFailure {
                        kind: None,
                        href: href.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }

            for lref in &decls.linkbase_refs {
                let (Some(kind), Some(href)) = (
                    lref.role.as_deref().and_then(LinkbaseKind::from_ref_role),
                    lref.href.as_deref(),
                ) else {
                    continue;
                };
                if kind == LinkbaseKind::Label && !accepts_label_file(self.language, href) {
                    continue;
                }

                let found = self
                    .locate(&location, href)
                    .and_then(|l| self.materialize(&l));
                match found {
                    Ok((path, origin)) => resolved.linkbases.entry(kind).or_default().push(ResolvedLinkbase {
                        kind,
                        href: href.to_string(),
                        path,
                        document,
                        origin,
                    }),
                    Err(e) => {
                        warn!("Unresolved {} linkbase {}: {}", kind, href, e);
                        resolved.failures.push(ResolutionFailure {
                            kind: Some(kind),
                            href: href.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            resolved.imports.extend(decls.imports);
            resolved.linkbase_refs.extend(decls.linkbase_refs);
        }

        info!(
            "Resolved {} linkbases from {} schemas with {} failures",
            resolved.linkbases.values().map(Vec::len).sum::<usize>(),
            resolved.schemas.len(),
            resolved.failures.len()
        );

        Ok(resolved)
    }
}
