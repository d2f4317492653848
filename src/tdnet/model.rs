//! One filing, its report-type recipe and lazily built output tables.

use std::collections::HashSet;

use log::{debug, info, warn};
use once_cell::unsync::OnceCell;
use serde::Serialize;

use super::fetch::{RemoteSource, TaxonomyCache};
use super::filing::{Filing, Origin, SourceFile};
use super::parsing::header::{derive_header, Header};
use super::parsing::ixbrl::{
    parse_instances, Context, DimensionMember, InstanceDocument, NumericFact, TextFact, UnitRow,
};
use super::parsing::xlink::{
    dedup_rows, parse_linkbase, Arc, ArcroleRef, EdgeRow, LabelRow, LinkbaseKind, LinkbaseSet, Locator,
    RoleRef,
};
use super::report::{Component, FileCategory, ReportDescriptor, ReportType};
use super::taxonomy::{ResolvedTaxonomy, TaxonomyResolver};
use crate::core::config::ParserConfig;
use crate::core::error::{Result, XbrlError};
use crate::storage::RecordSet;

fn component_of(kind: LinkbaseKind) -> Component {
    match kind {
        LinkbaseKind::Label => Component::Labels,
        LinkbaseKind::Calculation => Component::Calculations,
        LinkbaseKind::Definition => Component::Definitions,
        LinkbaseKind::Presentation => Component::Presentations,
    }
}

fn slot(kind: LinkbaseKind) -> usize {
    match kind {
        LinkbaseKind::Label => 0,
        LinkbaseKind::Calculation => 1,
        LinkbaseKind::Definition => 2,
        LinkbaseKind::Presentation => 3,
    }
}

/// `None` means no pruning: the report type extracts no facts.
type Present<'a> = Option<HashSet<&'a str>>;

fn retained(present: &Present<'_>, concept: Option<&str>) -> bool {
    match present {
        None => true,
        Some(set) => concept.map(|c| set.contains(c)).unwrap_or(false),
    }
}

/// A row annotated with the linkbase kind it was read from.
#[derive(Serialize)]
struct Tagged<T> {
    linkbase: String,
    #[serde(flatten)]
    row: T,
}

#[derive(Serialize)]
struct HeaderRow<'a> {
    report_type: &'static str,
    #[serde(flatten)]
    header: &'a Header,
}

/// A classified filing plus everything extracted from it. Each table is
/// computed on first access and cached; tables of components the report type
/// does not use are empty.
pub struct FilingModel {
    filing: Filing,
    config: ParserConfig,
    cache: TaxonomyCache,
    taxonomy: OnceCell<ResolvedTaxonomy>,
    sets: [OnceCell<LinkbaseSet>; 4],
    labels: OnceCell<Vec<LabelRow>>,
    calculations: OnceCell<Vec<EdgeRow>>,
    definitions: OnceCell<Vec<EdgeRow>>,
    presentations: OnceCell<Vec<EdgeRow>>,
    instance: OnceCell<InstanceDocument>,
    header: OnceCell<Header>,
}

impl FilingModel {
    pub fn new(filing: Filing, config: ParserConfig) -> Result<Self> {
        let cache = TaxonomyCache::new(&config)?;
        Ok(Self::assemble(filing, config, cache))
    }

    /// Same as `new` with an explicit remote for taxonomy downloads.
    pub fn with_source(filing: Filing, config: ParserConfig, source: Box<dyn RemoteSource>) -> Self {
        let cache = TaxonomyCache::with_source(&config, source);
        Self::assemble(filing, config, cache)
    }

    fn assemble(filing: Filing, config: ParserConfig, cache: TaxonomyCache) -> Self {
        info!("Building {} model for filing {}", filing.report_type, filing.id);
        Self {
            filing,
            config,
            cache,
            taxonomy: OnceCell::new(),
            sets: Default::default(),
            labels: OnceCell::new(),
            calculations: OnceCell::new(),
            definitions: OnceCell::new(),
            presentations: OnceCell::new(),
            instance: OnceCell::new(),
            header: OnceCell::new(),
        }
    }

    /// Rebuilds the model under a new configuration. Nothing computed under
    /// the old one survives.
    pub fn with_config(self, config: ParserConfig) -> Self {
        let cache = self.cache.reconfigure(&config);
        Self::assemble(self.filing, config, cache)
    }

    pub fn filing(&self) -> &Filing {
        &self.filing
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn report_type(&self) -> ReportType {
        self.filing.report_type
    }

    pub fn descriptor(&self) -> &'static ReportDescriptor {
        self.filing.report_type.descriptor()
    }

    pub fn enables(&self, component: Component) -> bool {
        self.descriptor().enables(component)
    }

    fn uses_taxonomy(&self) -> bool {
        LinkbaseKind::ALL.iter().any(|k| self.enables(component_of(*k)))
    }

    pub fn taxonomy(&self) -> Result<&ResolvedTaxonomy> {
        self.taxonomy.get_or_try_init(|| {
            TaxonomyResolver::new(self.filing.root(), &self.cache, self.config.label_language).resolve()
        })
    }

    /// Parsed linkbases of `kind`. Fails with the resolution error if any
    /// linkbase of that kind could not be located.
    pub fn linkbase_set(&self, kind: LinkbaseKind) -> Result<&LinkbaseSet> {
        self.sets[slot(kind)].get_or_try_init(|| -> Result<LinkbaseSet> {
            if !self.enables(component_of(kind)) {
                return Ok(LinkbaseSet::new(kind));
            }
            let files = self
                .taxonomy()?
                .linkbases(kind)?
                .iter()
                .map(|l| parse_linkbase(kind, &l.path))
                .collect::<Result<Vec<_>>>()?;
            let set = LinkbaseSet::aggregate(kind, files);

            let dangling = set.dangling_arcs();
            if !dangling.is_empty() {
                warn!("{} {} arcs point outside their container", dangling.len(), kind);
                for (path, arc) in &dangling {
                    debug!("Dangling arc in {}: {:?} -> {:?}", path.display(), arc.from, arc.to);
                }
            }
            Ok(set)
        })
    }

    /// Facts, contexts and units of every instance document in the filing.
    pub fn instance(&self) -> Result<&InstanceDocument> {
        self.instance.get_or_try_init(|| -> Result<InstanceDocument> {
            if !self.enables(Component::Facts) {
                return Ok(InstanceDocument::default());
            }
            let paths = self
                .filing
                .documents_of(FileCategory::Instance)
                .map(|d| d.path.as_path());
            let mut doc = parse_instances(paths)?;
            doc.contexts = dedup_rows(doc.contexts);
            doc.dimensions = dedup_rows(doc.dimensions);
            doc.units = dedup_rows(doc.units);
            Ok(doc)
        })
    }

    pub fn numeric_facts(&self) -> Result<&[NumericFact]> {
        Ok(&self.instance()?.numeric)
    }

    pub fn text_facts(&self) -> Result<&[TextFact]> {
        Ok(&self.instance()?.text)
    }

    pub fn contexts(&self) -> Result<&[Context]> {
        Ok(&self.instance()?.contexts)
    }

    pub fn dimensions(&self) -> Result<&[DimensionMember]> {
        Ok(&self.instance()?.dimensions)
    }

    pub fn units(&self) -> Result<&[UnitRow]> {
        Ok(&self.instance()?.units)
    }

    pub fn header(&self) -> Result<&Header> {
        self.header.get_or_try_init(|| -> Result<Header> {
            if !self.enables(Component::Header) {
                return Ok(Header::default());
            }
            Ok(derive_header(self.text_facts()?))
        })
    }

    fn present_concepts(&self) -> Result<Present<'_>> {
        if !self.enables(Component::Facts) {
            return Ok(None);
        }
        Ok(Some(self.instance()?.concepts()))
    }

    /// Labels in the configured language for concepts that carry a fact.
    pub fn labels(&self) -> Result<&[LabelRow]> {
        self.labels
            .get_or_try_init(|| -> Result<Vec<LabelRow>> {
                let set = self.linkbase_set(LinkbaseKind::Label)?;
                let present = self.present_concepts()?;
                let lang = self.config.label_language.code();
                Ok(set
                    .labels()
                    .into_iter()
                    .filter(|r| r.lang.as_deref().map(|l| l.starts_with(lang)).unwrap_or(true))
                    .filter(|r| retained(&present, r.concept.as_deref()))
                    .collect())
            })
            .map(Vec::as_slice)
    }

    fn pruned_edges<'s>(&'s self, cell: &'s OnceCell<Vec<EdgeRow>>, kind: LinkbaseKind) -> Result<&'s [EdgeRow]> {
        cell.get_or_try_init(|| -> Result<Vec<EdgeRow>> {
            let set = self.linkbase_set(kind)?;
            let present = self.present_concepts()?;
            Ok(set
                .edges()
                .into_iter()
                .filter(|e| {
                    retained(&present, e.from_concept.as_deref()) || retained(&present, e.to_concept.as_deref())
                })
                .collect())
        })
        .map(Vec::as_slice)
    }

    pub fn calculations(&self) -> Result<&[EdgeRow]> {
        self.pruned_edges(&self.calculations, LinkbaseKind::Calculation)
    }

    pub fn definitions(&self) -> Result<&[EdgeRow]> {
        self.pruned_edges(&self.definitions, LinkbaseKind::Definition)
    }

    pub fn presentations(&self) -> Result<&[EdgeRow]> {
        self.pruned_edges(&self.presentations, LinkbaseKind::Presentation)
    }

    pub fn roles(&self, kind: LinkbaseKind) -> Result<Vec<RoleRef>> {
        Ok(self.linkbase_set(kind)?.roles())
    }

    pub fn arcroles(&self, kind: LinkbaseKind) -> Result<Vec<ArcroleRef>> {
        Ok(self.linkbase_set(kind)?.arcroles())
    }

    /// Locators of concepts that carry a fact.
    pub fn locators(&self, kind: LinkbaseKind) -> Result<Vec<Locator>> {
        let present = self.present_concepts()?;
        Ok(self
            .linkbase_set(kind)?
            .locators()
            .into_iter()
            .filter(|l| retained(&present, l.concept.as_deref()))
            .collect())
    }

    /// Arcs touching a retained locator.
    pub fn arcs(&self, kind: LinkbaseKind) -> Result<Vec<Arc>> {
        let locators = self.locators(kind)?;
        let keys: HashSet<(Option<&str>, Option<&str>)> = locators
            .iter()
            .map(|l| (l.container_role.as_deref(), l.label.as_deref()))
            .collect();
        Ok(self
            .linkbase_set(kind)?
            .arcs()
            .into_iter()
            .filter(|a| {
                let role = a.container_role.as_deref();
                keys.contains(&(role, a.from.as_deref())) || keys.contains(&(role, a.to.as_deref()))
            })
            .collect())
    }

    /// Every document that contributed to this filing: the bundle's own files
    /// and the taxonomy files read from the cache.
    pub fn source_files(&self) -> Result<Vec<SourceFile>> {
        let mut names: Vec<(String, Origin)> = self
            .filing
            .documents()
            .iter()
            .map(|d| (d.file_name.clone(), Origin::Local))
            .collect();

        if self.uses_taxonomy() {
            let taxonomy = self.taxonomy()?;
            let remote = taxonomy
                .schemas
                .iter()
                .map(|(path, origin)| (path.as_path(), *origin))
                .chain(taxonomy.all_linkbases().map(|l| (l.path.as_path(), l.origin)))
                .filter(|(_, origin)| *origin == Origin::Remote);
            for (path, origin) in remote {
                let name = path.strip_prefix(self.cache.root()).unwrap_or(path);
                names.push((name.display().to_string(), origin));
            }
        }

        let mut seen = HashSet::new();
        Ok(names
            .into_iter()
            .filter(|(name, _)| seen.insert(name.clone()))
            .enumerate()
            .map(|(i, (name, origin))| SourceFile {
                id: i as u32 + 1,
                name,
                origin,
                filing_id: self.filing.id.clone(),
            })
            .collect())
    }

    /// Linkbase kinds whose tables can be built. A kind with unresolved
    /// references is logged and left out, so its tables stay empty.
    fn available_kinds(&self) -> Result<Vec<LinkbaseKind>> {
        let mut kinds = Vec::new();
        for kind in LinkbaseKind::ALL {
            if !self.enables(component_of(kind)) {
                continue;
            }
            match self.linkbase_set(kind) {
                Ok(_) => kinds.push(kind),
                Err(e @ XbrlError::Resolution { .. }) | Err(e @ XbrlError::Fetch { .. }) => {
                    warn!("Filing {}: {} tables left empty: {}", self.filing.id, kind, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(kinds)
    }

    fn edges_if(&self, kinds: &[LinkbaseKind], kind: LinkbaseKind) -> Result<&[EdgeRow]> {
        if !kinds.contains(&kind) {
            return Ok(&[]);
        }
        match kind {
            LinkbaseKind::Calculation => self.calculations(),
            LinkbaseKind::Definition => self.definitions(),
            LinkbaseKind::Presentation => self.presentations(),
            LinkbaseKind::Label => Ok(&[]),
        }
    }

    /// All output tables of this filing, every row tagged with the filing id.
    pub fn records(&self) -> Result<Vec<RecordSet>> {
        let id = self.filing.id.as_str();
        let kinds = self.available_kinds()?;

        let mut roles = Vec::new();
        let mut locators = Vec::new();
        let mut arcs = Vec::new();
        for kind in &kinds {
            roles.extend(self.roles(*kind)?.into_iter().map(|row| Tagged {
                linkbase: kind.to_string(),
                row,
            }));
            locators.extend(self.locators(*kind)?.into_iter().map(|row| Tagged {
                linkbase: kind.to_string(),
                row,
            }));
            arcs.extend(self.arcs(*kind)?.into_iter().map(|row| Tagged {
                linkbase: kind.to_string(),
                row,
            }));
        }

        let labels = if kinds.contains(&LinkbaseKind::Label) {
            self.labels()?
        } else {
            &[]
        };

        const EDGE_KEYS: &[&str] = &[
            "filing_id",
            "role",
            "from_schema",
            "from_concept",
            "to_schema",
            "to_concept",
            "arcrole",
        ];

        let header = HeaderRow {
            report_type: self.report_type().code(),
            header: self.header()?,
        };

        let sets = vec![
            RecordSet::from_rows("source_files", &["filing_id", "id"], id, self.source_files()?)?,
            RecordSet::from_rows("roles", &["filing_id", "linkbase", "role_uri", "href"], id, roles)?,
            RecordSet::from_rows(
                "locators",
                &["filing_id", "linkbase", "container_role", "label", "schema", "concept"],
                id,
                locators,
            )?,
            RecordSet::from_rows(
                "arcs",
                &["filing_id", "linkbase", "container_role", "from", "to", "arcrole"],
                id,
                arcs,
            )?,
            RecordSet::from_rows(
                "labels",
                &["filing_id", "schema", "concept", "label_role", "lang"],
                id,
                labels,
            )?,
            RecordSet::from_rows("calculations", EDGE_KEYS, id, self.edges_if(&kinds, LinkbaseKind::Calculation)?)?,
            RecordSet::from_rows("definitions", EDGE_KEYS, id, self.edges_if(&kinds, LinkbaseKind::Definition)?)?,
            RecordSet::from_rows(
                "presentations",
                EDGE_KEYS,
                id,
                self.edges_if(&kinds, LinkbaseKind::Presentation)?,
            )?,
            RecordSet::from_rows(
                "facts_numeric",
                &["filing_id", "document", "context_ref", "prefix", "concept", "unit_ref"],
                id,
                self.numeric_facts()?,
            )?,
            RecordSet::from_rows(
                "facts_text",
                &["filing_id", "document", "context_ref", "prefix", "concept"],
                id,
                self.text_facts()?,
            )?,
            RecordSet::from_rows("contexts", &["filing_id", "id"], id, self.contexts()?)?,
            RecordSet::from_rows(
                "context_dimensions",
                &["filing_id", "context_id", "dimension"],
                id,
                self.dimensions()?,
            )?,
            RecordSet::from_rows("units", &["filing_id", "id"], id, self.units()?)?,
            RecordSet::from_rows("headers", &["filing_id"], id, [header])?,
        ];

        debug!(
            "Filing {} produced {} rows across {} tables",
            id,
            sets.iter().map(RecordSet::len).sum::<usize>(),
            sets.len()
        );
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LabelLanguage;
    use crate::tdnet::fetch::tests::StubSource;
    use crate::tdnet::parsing::tests::{
        read_test_file, summary_bundle, taxonomy_cache_root, write_fixture_zip, write_zip,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const TSE_ED_T: &str = "http://www.xbrl.tdnet.info/taxonomy/jp/tse/tdnet/ed/t/2014-01-12/";

    fn open_summary(dir: &std::path::Path) -> Filing {
        let archive = dir.join("081220230512582935.zip");
        write_fixture_zip(&archive, &summary_bundle());
        Filing::open(&archive).unwrap()
    }

    fn offline_config() -> ParserConfig {
        ParserConfig::new(taxonomy_cache_root()).offline(true)
    }

    fn concepts(rows: &[LabelRow]) -> Vec<(&str, &str)> {
        rows.iter()
            .map(|r| (r.concept.as_deref().unwrap(), r.text.as_deref().unwrap()))
            .collect()
    }

    #[test]
    fn test_full_earnings_tables_are_pruned_to_facts() {
        let dir = tempfile::tempdir().unwrap();
        let model = FilingModel::new(open_summary(dir.path()), offline_config()).unwrap();
        assert_eq!(model.report_type(), ReportType::EarningsJapanGaap);

        let mut labels = concepts(model.labels().unwrap());
        labels.sort();
        assert_eq!(
            labels,
            vec![
                ("CompanyName", "会社名"),
                ("NetIncomePerShare", "1株当たり当期純利益"),
                ("NetSales", "売上高"),
                ("OperatingIncome", "営業利益"),
            ]
        );

        let calculations = model.calculations().unwrap();
        assert_eq!(calculations.len(), 1);
        assert_eq!(calculations[0].from_concept.as_deref(), Some("OperatingIncome"));
        assert_eq!(calculations[0].to_concept.as_deref(), Some("NetSales"));
        assert_eq!(calculations[0].weight, Some(1.0));

        // Kept because one endpoint carries a fact.
        let definitions = model.definitions().unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].from_concept.as_deref(), Some("BusinessResultsHeading"));
        assert_eq!(model.arcroles(LinkbaseKind::Definition).unwrap().len(), 1);
        assert!(model.arcroles(LinkbaseKind::Presentation).unwrap().is_empty());

        let presentations = model.presentations().unwrap();
        assert_eq!(presentations.len(), 2);
        assert_eq!(presentations[1].order, Some(2.0));

        assert_eq!(model.header().unwrap().securities_code.as_deref(), Some("7203"));
    }

    #[test]
    fn test_records_are_tagged_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let model = FilingModel::new(open_summary(dir.path()), offline_config()).unwrap();
        let sets = model.records().unwrap();

        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "source_files",
                "roles",
                "locators",
                "arcs",
                "labels",
                "calculations",
                "definitions",
                "presentations",
                "facts_numeric",
                "facts_text",
                "contexts",
                "context_dimensions",
                "units",
                "headers",
            ]
        );
        for set in &sets {
            assert!(set.rows.iter().all(|r| r["filing_id"] == "081220230512582935"), "{}", set.name);
        }

        let sources = &sets[0];
        assert_eq!(sources.len(), 8);
        let remote = sources.rows.iter().filter(|r| r["origin"] == "remote").count();
        assert_eq!(remote, 2);

        let headers = sets.iter().find(|s| s.name == "headers").unwrap();
        assert_eq!(headers.rows[0]["report_type"], "edjp");
        assert_eq!(headers.rows[0]["company_name"], "トヨタ自動車株式会社");

        let roles = sets.iter().find(|s| s.name == "roles").unwrap();
        assert!(roles.rows.iter().any(|r| r["linkbase"] == "definition"));
    }

    #[test]
    fn test_remote_labels_are_fetched_once_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let xsd = format!("{}tse-ed-t-2014-01-12.xsd", TSE_ED_T);
        let lab = format!("{}tse-ed-t-2014-01-12-lab.xml", TSE_ED_T);
        let xsd_body = read_test_file("taxonomy/www.xbrl.tdnet.info/taxonomy/jp/tse/tdnet/ed/t/2014-01-12/tse-ed-t-2014-01-12.xsd");
        let lab_body = read_test_file("taxonomy/www.xbrl.tdnet.info/taxonomy/jp/tse/tdnet/ed/t/2014-01-12/tse-ed-t-2014-01-12-lab.xml");
        let stub = StubSource::new(&[(xsd.as_str(), xsd_body.as_str()), (lab.as_str(), lab_body.as_str())]);
        let calls = stub.calls.clone();

        let config = ParserConfig::new(cache.path())
            .with_fetch_interval(Duration::from_secs(1))
            .unwrap();
        let model = FilingModel::with_source(open_summary(dir.path()), config.clone(), Box::new(stub));

        assert_eq!(model.labels().unwrap().len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.path().join("www.xbrl.tdnet.info/taxonomy/jp/tse/tdnet/ed/t/2014-01-12/tse-ed-t-2014-01-12-lab.xml").is_file());

        // English labels live in a file the stub does not serve.
        let english = model.with_config(config.with_label_language(LabelLanguage::English));
        assert!(matches!(english.labels(), Err(XbrlError::Resolution { .. })));
        assert_eq!(english.calculations().unwrap().len(), 1);

        let sets = english.records().unwrap();
        let labels = sets.iter().find(|s| s.name == "labels").unwrap();
        assert!(labels.is_empty());
        let calculations = sets.iter().find(|s| s.name == "calculations").unwrap();
        assert_eq!(calculations.len(), 1);
    }

    #[test]
    fn test_dividend_revision_runs_definitions_only() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rvdf.zip");
        let instance = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:ix="http://www.xbrl.org/2013/inlineXBRL" xmlns:xbrli="http://www.xbrl.org/2003/instance">
<body><ix:header><ix:resources>
<xbrli:context id="c1"><xbrli:entity><xbrli:identifier scheme="http://disclosure.edinet-fsa.go.jp">72030-000</xbrli:identifier></xbrli:entity><xbrli:period><xbrli:instant>2023-03-31</xbrli:instant></xbrli:period></xbrli:context>
</ix:resources></ix:header>
<ix:nonNumeric contextRef="c1" name="tse-ed-t:CompanyName">トヨタ自動車株式会社</ix:nonNumeric>
<ix:nonFraction contextRef="c1" name="tse-ed-t:NetSales" unitRef="JPY" scale="6">100</ix:nonFraction>
</body></html>"#;
        let schema = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <xsd:annotation><xsd:appinfo>
    <link:linkbaseRef xlink:type="simple" xlink:href="tse-rvdf-72030-20230512-def.xml" xlink:role="http://www.xbrl.org/2003/role/definitionLinkbaseRef"/>
  </xsd:appinfo></xsd:annotation>
</xsd:schema>"#;
        write_zip(
            &archive,
            &[
                ("tse-rvdf-72030-20230512-ixbrl.htm".to_string(), instance.to_string()),
                ("tse-rvdf-72030-20230512.xsd".to_string(), schema.to_string()),
                (
                    "tse-rvdf-72030-20230512-def.xml".to_string(),
                    read_test_file("tse-acedjpsm-72030-20230512382920-def.xml"),
                ),
            ],
        );

        let filing = Filing::open(&archive).unwrap();
        assert_eq!(filing.report_type, ReportType::DividendRevision);
        let model = FilingModel::new(filing, offline_config()).unwrap();

        assert!(model.labels().unwrap().is_empty());
        assert!(model.calculations().unwrap().is_empty());
        assert!(model.presentations().unwrap().is_empty());
        assert_eq!(model.definitions().unwrap().len(), 1);
        assert_eq!(model.numeric_facts().unwrap().len(), 1);
        assert_eq!(model.header().unwrap().company_name.as_deref(), Some("トヨタ自動車株式会社"));
    }
}
