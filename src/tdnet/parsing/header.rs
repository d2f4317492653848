use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ixbrl::TextFact;

/// Filing metadata derived from the non-numeric facts of a filing.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub company_name: Option<String>,
    pub securities_code: Option<String>,
    pub document_name: Option<String>,
    pub filing_date: Option<String>,
    pub current_period: Option<String>,
    pub listed_market: Option<String>,
    pub market_section: Option<String>,
    pub url: Option<String>,
    pub fiscal_year_end: Option<String>,
    pub telephone: Option<String>,
    pub balance_sheet: bool,
    pub income_statement: bool,
    pub cash_flow_statement: bool,
    pub comprehensive_income: bool,
    pub equity_changes: bool,
    pub financial_position: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    CompanyName,
    SecuritiesCode,
    DocumentName,
    FilingDate,
    CurrentPeriod,
    ListedMarket,
    MarketSection,
    Url,
    FiscalYearEnd,
    Telephone,
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    ComprehensiveIncome,
    EquityChanges,
    FinancialPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Keep the first value seen.
    First,
    /// Later matches overwrite.
    Refine,
}

/// What a matching fact contributes to its field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Take {
    Value,
    /// The concept name, for boolean facts whose value is `true`.
    ConceptIfTrue,
    /// Presence of the concept sets the flag.
    Flag,
}

struct Matcher {
    field: Field,
    pattern: Regex,
    mode: Mode,
    take: Take,
}

fn matcher(field: Field, pattern: &str, mode: Mode, take: Take) -> Matcher {
    Matcher {
        field,
        pattern: Regex::new(pattern).unwrap(),
        mode,
        take,
    }
}

/// Ordered by priority. A fact is claimed by the first matcher whose pattern
/// hits its concept name, so the comprehensive-income rule has to precede the
/// broader income-statement rule.
static MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    use Field::*;
    use Mode::*;
    use Take::*;
    vec![
        matcher(CompanyName, r"^CompanyName$", First, Value),
        matcher(SecuritiesCode, r"^SecuritiesCode$", First, Value),
        matcher(DocumentName, r"^DocumentName$", First, Value),
        matcher(FilingDate, r"^FilingDate$", First, Value),
        matcher(FilingDate, r"Correction.*Date|DateOfCorrection", Refine, Value),
        matcher(CurrentPeriod, r"^(CurrentPeriod|QuarterlyPeriod|TypeOfCurrentPeriod)", First, Value),
        matcher(ListedMarket, r"StockExchange$", First, ConceptIfTrue),
        matcher(
            MarketSection,
            r"^(Tokyo|Nagoya|Sapporo|Fukuoka)(Prime|Standard|Growth|Premier|Main|Next|Ambitious|QBoard|1st|2nd|Mothers|JASDAQ)",
            Refine,
            ConceptIfTrue,
        ),
        matcher(Url, r"^URL$|Url$", First, Value),
        matcher(FiscalYearEnd, r"FiscalYearEnd", First, Value),
        matcher(Telephone, r"^Tel$|TelephoneNumber|PhoneNumber", First, Value),
        matcher(BalanceSheet, r"BalanceSheets?.*TextBlock$", First, Flag),
        matcher(ComprehensiveIncome, r"ComprehensiveIncome.*TextBlock$", First, Flag),
        matcher(IncomeStatement, r"(Income|ProfitOrLoss|Operations).*TextBlock$", First, Flag),
        matcher(CashFlow, r"CashFlows?.*TextBlock$", First, Flag),
        matcher(EquityChanges, r"ChangesIn.*(Equity|NetAssets).*TextBlock$", First, Flag),
        matcher(FinancialPosition, r"FinancialPosition.*TextBlock$", First, Flag),
    ]
});

impl Header {
    fn slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::CompanyName => Some(&mut self.company_name),
            Field::SecuritiesCode => Some(&mut self.securities_code),
            Field::DocumentName => Some(&mut self.document_name),
            Field::FilingDate => Some(&mut self.filing_date),
            Field::CurrentPeriod => Some(&mut self.current_period),
            Field::ListedMarket => Some(&mut self.listed_market),
            Field::MarketSection => Some(&mut self.market_section),
            Field::Url => Some(&mut self.url),
            Field::FiscalYearEnd => Some(&mut self.fiscal_year_end),
            Field::Telephone => Some(&mut self.telephone),
            _ => None,
        }
    }

    fn flag(&mut self, field: Field) -> Option<&mut bool> {
        match field {
            Field::BalanceSheet => Some(&mut self.balance_sheet),
            Field::IncomeStatement => Some(&mut self.income_statement),
            Field::CashFlow => Some(&mut self.cash_flow_statement),
            Field::ComprehensiveIncome => Some(&mut self.comprehensive_income),
            Field::EquityChanges => Some(&mut self.equity_changes),
            Field::FinancialPosition => Some(&mut self.financial_position),
            _ => None,
        }
    }

    fn apply(&mut self, m: &Matcher, concept: &str, value: Option<&str>) {
        if m.take == Take::Flag {
            if let Some(flag) = self.flag(m.field) {
                *flag = true;
            }
            return;
        }

        let candidate = match m.take {
            Take::ConceptIfTrue if value == Some("true") => Some(concept.to_string()),
            Take::ConceptIfTrue => None,
            _ => value.filter(|v| !v.is_empty()).map(str::to_string),
        };
        let Some(candidate) = candidate else {
            return;
        };
        if let Some(slot) = self.slot(m.field) {
            if slot.is_none() || m.mode == Mode::Refine {
                *slot = Some(candidate);
            }
        }
    }
}

/// Single pass over the text facts, in document order.
pub fn derive_header(facts: &[TextFact]) -> Header {
    let mut header = Header::default();
    for fact in facts.iter().filter(|f| !f.nil) {
        let Some(concept) = fact.concept.as_deref() else {
            continue;
        };
        if let Some(m) = MATCHERS.iter().find(|m| m.pattern.is_match(concept)) {
            header.apply(m, concept, fact.value.as_deref());
        }
    }
    header
}
