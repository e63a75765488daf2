//! Triple store port and the in-memory test adapter.
//!
//! The production store is an external collaborator reached through
//! `TripleStore`. `MemoryStore` implements the port with a basic graph
//! pattern matcher covering the query shapes hook conditions use: ASK and
//! SELECT over conjunctive triple patterns, with FILTER NOT EXISTS groups
//! and PREFIX expansion. Anything beyond that surface is reported as
//! `UnsupportedQuery` rather than silently mis-answered.

use crate::error::{UnrdfError, UnrdfResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Object position of a triple: IRI or literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(String),
    Literal(String),
}

impl Term {
    pub fn iri(value: &str) -> Self {
        Term::Iri(value.to_string())
    }

    pub fn literal(value: &str) -> Self {
        Term::Literal(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Term::Iri(s) | Term::Literal(s) => s,
        }
    }
}

/// (subject IRI, predicate IRI, object IRI-or-literal)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: Term) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        }
    }
}

/// Serialization formats the port understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    NTriples,
}

/// Result of a SPARQL query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Ask(bool),
    Solutions(Vec<BTreeMap<String, Term>>),
}

impl QueryOutcome {
    pub fn as_bool(&self) -> bool {
        match self {
            QueryOutcome::Ask(b) => *b,
            QueryOutcome::Solutions(rows) => !rows.is_empty(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryOutcome::Ask(b) => usize::from(*b),
            QueryOutcome::Solutions(rows) => rows.len(),
        }
    }
}

/// RDF store port: SPARQL query, atomic add/remove, serialization
#[async_trait]
pub trait TripleStore: Send + Sync {
    async fn query(&self, sparql: &str) -> UnrdfResult<QueryOutcome>;
    async fn add(&self, triple: Triple) -> UnrdfResult<()>;
    /// Returns whether the triple was present
    async fn remove(&self, triple: &Triple) -> UnrdfResult<bool>;
    async fn len(&self) -> UnrdfResult<usize>;
    async fn serialize(&self, format: RdfFormat) -> UnrdfResult<String>;
    /// Returns the number of triples loaded
    async fn parse(&self, data: &str, format: RdfFormat) -> UnrdfResult<usize>;
}

/// In-memory store adapter used by tests and local runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    triples: RwLock<BTreeSet<Triple>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeSet<Triple> {
        self.triples.read().clone()
    }
}

#[async_trait]
impl TripleStore for MemoryStore {
    async fn query(&self, sparql: &str) -> UnrdfResult<QueryOutcome> {
        let query = parse_query(sparql)?;
        let triples = self.triples.read();
        let solutions = match_group(&query.group, &triples, BTreeMap::new());
        match query.form {
            QueryForm::Ask => Ok(QueryOutcome::Ask(!solutions.is_empty())),
            QueryForm::Select(vars) => {
                let rows = solutions
                    .into_iter()
                    .map(|bindings| match &vars {
                        Some(vars) => bindings
                            .into_iter()
                            .filter(|(name, _)| vars.contains(name))
                            .collect(),
                        None => bindings,
                    })
                    .collect();
                Ok(QueryOutcome::Solutions(rows))
            }
        }
    }

    async fn add(&self, triple: Triple) -> UnrdfResult<()> {
        self.triples.write().insert(triple);
        Ok(())
    }

    async fn remove(&self, triple: &Triple) -> UnrdfResult<bool> {
        Ok(self.triples.write().remove(triple))
    }

    async fn len(&self) -> UnrdfResult<usize> {
        Ok(self.triples.read().len())
    }

    async fn serialize(&self, format: RdfFormat) -> UnrdfResult<String> {
        match format {
            RdfFormat::NTriples => {
                let triples = self.triples.read();
                let mut out = String::new();
                for t in triples.iter() {
                    let object = match &t.object {
                        Term::Iri(iri) => format!("<{iri}>"),
                        Term::Literal(lit) => format!("\"{}\"", lit.replace('"', "\\\"")),
                    };
                    out.push_str(&format!("<{}> <{}> {} .\n", t.subject, t.predicate, object));
                }
                Ok(out)
            }
        }
    }

    async fn parse(&self, data: &str, format: RdfFormat) -> UnrdfResult<usize> {
        match format {
            RdfFormat::NTriples => {
                let mut loaded = 0;
                for line in data.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let triple = parse_ntriples_line(line)?;
                    self.triples.write().insert(triple);
                    loaded += 1;
                }
                Ok(loaded)
            }
        }
    }
}

fn parse_ntriples_line(line: &str) -> UnrdfResult<Triple> {
    let tokens = tokenize(line)?;
    match tokens.as_slice() {
        [SparqlToken::Iri(s), SparqlToken::Iri(p), SparqlToken::Iri(o), SparqlToken::Dot] => {
            Ok(Triple::new(s, p, Term::iri(o)))
        }
        [SparqlToken::Iri(s), SparqlToken::Iri(p), SparqlToken::Literal(o), SparqlToken::Dot] => {
            Ok(Triple::new(s, p, Term::literal(o)))
        }
        _ => Err(UnrdfError::Validation(format!(
            "malformed N-Triples line: {line}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Minimal SPARQL evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum SparqlToken {
    Iri(String),
    Literal(String),
    Var(String),
    Word(String),
    LBrace,
    RBrace,
    Dot,
    Star,
}

#[derive(Debug, Clone, PartialEq)]
enum PatternTerm {
    Var(String),
    Iri(String),
    Literal(String),
}

#[derive(Debug, Clone)]
enum GroupItem {
    Pattern(PatternTerm, PatternTerm, PatternTerm),
    FilterNotExists(Vec<GroupItem>),
}

enum QueryForm {
    Ask,
    /// None = SELECT *
    Select(Option<BTreeSet<String>>),
}

struct ParsedQuery {
    form: QueryForm,
    group: Vec<GroupItem>,
}

fn tokenize(input: &str) -> UnrdfResult<Vec<SparqlToken>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '{' => {
                tokens.push(SparqlToken::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(SparqlToken::RBrace);
                i += 1;
            }
            '.' => {
                tokens.push(SparqlToken::Dot);
                i += 1;
            }
            '*' => {
                tokens.push(SparqlToken::Star);
                i += 1;
            }
            '<' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == '>')
                    .ok_or_else(|| UnrdfError::UnsupportedQuery("unterminated IRI".into()))?;
                let iri: String = chars[i + 1..i + end].iter().collect();
                tokens.push(SparqlToken::Iri(iri));
                i += end + 1;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') if chars.get(i + 1) == Some(&'"') => {
                            value.push('"');
                            i += 2;
                        }
                        Some(c) => {
                            value.push(*c);
                            i += 1;
                        }
                        None => {
                            return Err(UnrdfError::UnsupportedQuery(
                                "unterminated literal".into(),
                            ))
                        }
                    }
                }
                tokens.push(SparqlToken::Literal(value));
            }
            '?' | '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                if end == start {
                    return Err(UnrdfError::UnsupportedQuery("empty variable name".into()));
                }
                tokens.push(SparqlToken::Var(chars[start..end].iter().collect()));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric()
                        || chars[end] == '_'
                        || chars[end] == ':'
                        || chars[end] == '-')
                {
                    end += 1;
                }
                tokens.push(SparqlToken::Word(chars[start..end].iter().collect()));
                i = end;
            }
            other => {
                return Err(UnrdfError::UnsupportedQuery(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }
    Ok(tokens)
}

struct QueryParser {
    tokens: Vec<SparqlToken>,
    position: usize,
    prefixes: BTreeMap<String, String>,
}

impl QueryParser {
    fn peek(&self) -> Option<&SparqlToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<SparqlToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek_word(&self, expected: &str) -> bool {
        matches!(self.peek(), Some(SparqlToken::Word(w)) if w.eq_ignore_ascii_case(expected))
    }

    fn expect_word(&mut self, expected: &str) -> UnrdfResult<()> {
        if self.peek_word(expected) {
            self.advance();
            Ok(())
        } else {
            Err(UnrdfError::UnsupportedQuery(format!(
                "expected keyword {expected}"
            )))
        }
    }

    fn expand(&self, word: &str) -> UnrdfResult<PatternTerm> {
        if word == "a" {
            return Ok(PatternTerm::Iri(RDF_TYPE.to_string()));
        }
        if let Some((prefix, local)) = word.split_once(':') {
            if let Some(base) = self.prefixes.get(prefix) {
                return Ok(PatternTerm::Iri(format!("{base}{local}")));
            }
        }
        Err(UnrdfError::UnsupportedQuery(format!(
            "unknown prefixed name {word}"
        )))
    }

    fn parse_term(&mut self) -> UnrdfResult<PatternTerm> {
        match self.advance() {
            Some(SparqlToken::Var(name)) => Ok(PatternTerm::Var(name)),
            Some(SparqlToken::Iri(iri)) => Ok(PatternTerm::Iri(iri)),
            Some(SparqlToken::Literal(value)) => Ok(PatternTerm::Literal(value)),
            Some(SparqlToken::Word(word)) => self.expand(&word),
            other => Err(UnrdfError::UnsupportedQuery(format!(
                "expected term, got {other:?}"
            ))),
        }
    }

    fn parse_group(&mut self) -> UnrdfResult<Vec<GroupItem>> {
        match self.advance() {
            Some(SparqlToken::LBrace) => {}
            _ => return Err(UnrdfError::UnsupportedQuery("expected '{'".into())),
        }
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(SparqlToken::RBrace) => {
                    self.advance();
                    return Ok(items);
                }
                Some(SparqlToken::Dot) => {
                    self.advance();
                }
                Some(SparqlToken::Word(w)) if w.eq_ignore_ascii_case("filter") => {
                    self.advance();
                    self.expect_word("not")?;
                    self.expect_word("exists")?;
                    let inner = self.parse_group()?;
                    items.push(GroupItem::FilterNotExists(inner));
                }
                Some(_) => {
                    let s = self.parse_term()?;
                    let p = self.parse_term()?;
                    let o = self.parse_term()?;
                    items.push(GroupItem::Pattern(s, p, o));
                }
                None => {
                    return Err(UnrdfError::UnsupportedQuery("unterminated group".into()));
                }
            }
        }
    }
}

fn parse_query(sparql: &str) -> UnrdfResult<ParsedQuery> {
    let tokens = tokenize(sparql)?;
    let mut parser = QueryParser {
        tokens,
        position: 0,
        prefixes: BTreeMap::new(),
    };

    // Prologue
    while parser.peek_word("prefix") {
        parser.advance();
        let name = match parser.advance() {
            Some(SparqlToken::Word(w)) => w.trim_end_matches(':').to_string(),
            _ => return Err(UnrdfError::UnsupportedQuery("bad PREFIX name".into())),
        };
        let base = match parser.advance() {
            Some(SparqlToken::Iri(iri)) => iri,
            _ => return Err(UnrdfError::UnsupportedQuery("bad PREFIX IRI".into())),
        };
        parser.prefixes.insert(name, base);
    }

    if parser.peek_word("ask") {
        parser.advance();
        let group = parser.parse_group()?;
        return Ok(ParsedQuery {
            form: QueryForm::Ask,
            group,
        });
    }

    if parser.peek_word("select") {
        parser.advance();
        let mut vars: BTreeSet<String> = BTreeSet::new();
        let mut star = false;
        loop {
            match parser.peek() {
                Some(SparqlToken::Var(_)) => {
                    if let Some(SparqlToken::Var(name)) = parser.advance() {
                        vars.insert(name);
                    }
                }
                Some(SparqlToken::Star) => {
                    parser.advance();
                    star = true;
                }
                _ => break,
            }
        }
        parser.expect_word("where")?;
        let group = parser.parse_group()?;
        let projection = if star || vars.is_empty() {
            None
        } else {
            Some(vars)
        };
        return Ok(ParsedQuery {
            form: QueryForm::Select(projection),
            group,
        });
    }

    Err(UnrdfError::UnsupportedQuery(
        "only ASK and SELECT are supported".into(),
    ))
}

fn term_matches(
    pattern: &PatternTerm,
    value: &Term,
    bindings: &mut BTreeMap<String, Term>,
) -> bool {
    match pattern {
        PatternTerm::Iri(iri) => matches!(value, Term::Iri(v) if v == iri),
        PatternTerm::Literal(lit) => matches!(value, Term::Literal(v) if v == lit),
        PatternTerm::Var(name) => match bindings.get(name) {
            Some(bound) => bound == value,
            None => {
                bindings.insert(name.clone(), value.clone());
                true
            }
        },
    }
}

fn match_group(
    items: &[GroupItem],
    triples: &BTreeSet<Triple>,
    seed: BTreeMap<String, Term>,
) -> Vec<BTreeMap<String, Term>> {
    let mut solutions = vec![seed];
    for item in items {
        match item {
            GroupItem::Pattern(s, p, o) => {
                let mut next = Vec::new();
                for solution in &solutions {
                    for triple in triples.iter() {
                        let mut bindings = solution.clone();
                        let subject = Term::Iri(triple.subject.clone());
                        let predicate = Term::Iri(triple.predicate.clone());
                        if term_matches(s, &subject, &mut bindings)
                            && term_matches(p, &predicate, &mut bindings)
                            && term_matches(o, &triple.object, &mut bindings)
                        {
                            next.push(bindings);
                        }
                    }
                }
                solutions = next;
            }
            GroupItem::FilterNotExists(inner) => {
                solutions.retain(|solution| {
                    match_group(inner, triples, solution.clone()).is_empty()
                });
            }
        }
        if solutions.is_empty() {
            break;
        }
    }
    solutions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_people() -> MemoryStore {
        let store = MemoryStore::new();
        let mut triples = store.triples.write();
        triples.insert(Triple::new(
            "urn:person:1",
            RDF_TYPE,
            Term::iri("http://example.org/Person"),
        ));
        triples.insert(Triple::new(
            "urn:person:1",
            "http://example.org/name",
            Term::literal("Alice"),
        ));
        triples.insert(Triple::new(
            "urn:person:2",
            RDF_TYPE,
            Term::iri("http://example.org/Person"),
        ));
        drop(triples);
        store
    }

    #[tokio::test]
    async fn ask_wildcard_matches_any_triple() {
        let store = store_with_people();
        let outcome = store.query("ASK { ?s ?p ?o }").await.unwrap();
        assert!(outcome.as_bool());

        let empty = MemoryStore::new();
        let outcome = empty.query("ASK { ?s ?p ?o }").await.unwrap();
        assert!(!outcome.as_bool());
    }

    #[tokio::test]
    async fn filter_not_exists_detects_missing_property() {
        let store = store_with_people();
        let query = r#"
            PREFIX ex: <http://example.org/>
            ASK {
                ?p a ex:Person
                FILTER NOT EXISTS { ?p ex:name ?n }
            }
        "#;
        // person:2 has no name, so the condition holds
        let outcome = store.query(query).await.unwrap();
        assert!(outcome.as_bool());

        store
            .add(Triple::new(
                "urn:person:2",
                "http://example.org/name",
                Term::literal("Bob"),
            ))
            .await
            .unwrap();
        let outcome = store.query(query).await.unwrap();
        assert!(!outcome.as_bool());
    }

    #[tokio::test]
    async fn select_projects_requested_variables() {
        let store = store_with_people();
        let query = r#"
            PREFIX ex: <http://example.org/>
            SELECT ?name WHERE { ?p ex:name ?name }
        "#;
        let outcome = store.query(query).await.unwrap();
        match outcome {
            QueryOutcome::Solutions(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("name"), Some(&Term::literal("Alice")));
            }
            other => panic!("expected solutions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn joins_share_variable_bindings() {
        let store = store_with_people();
        let query = r#"
            PREFIX ex: <http://example.org/>
            SELECT ?p WHERE { ?p a ex:Person . ?p ex:name ?n }
        "#;
        let outcome = store.query(query).await.unwrap();
        assert_eq!(outcome.row_count(), 1);
    }

    #[tokio::test]
    async fn unsupported_query_is_reported() {
        let store = MemoryStore::new();
        let err = store.query("CONSTRUCT { ?s ?p ?o }").await.unwrap_err();
        assert!(matches!(err, UnrdfError::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn ntriples_roundtrip() {
        let store = store_with_people();
        let text = store.serialize(RdfFormat::NTriples).await.unwrap();

        let restored = MemoryStore::new();
        let loaded = restored.parse(&text, RdfFormat::NTriples).await.unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(restored.snapshot(), store.snapshot());
    }
}
