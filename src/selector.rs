//! Listes de sélecteurs CSS des règles.
//!
//! Chaque motif est validé par `scraper` au chargement des règles, puis la
//! liste est compilée une fois. Le texte CSS d'origine est conservé tel quel
//! pour le backend navigateur, qui délègue à `matches`/`closest`/
//! `querySelectorAll`.

use std::fmt;

use scraper::Selector;

use crate::error::RuleError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorList {
    patterns: Vec<String>,
    /// `patterns` joints par des virgules.
    css: String,
    /// `None` pour une liste vide, qui ne matche rien.
    compiled: Option<Selector>,
}

impl SelectorList {
    /// Un seul motif, éventuellement déjà une liste séparée par des virgules.
    pub fn parse(input: &str) -> Result<Self, RuleError> {
        Self::from_patterns(&[input])
    }

    /// Valide chaque motif séparément (l'erreur nomme le motif fautif), puis
    /// compile l'union.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RuleError> {
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            compile(pattern)?;
            kept.push(pattern.to_string());
        }

        let css = kept.join(", ");
        let compiled = if kept.is_empty() { None } else { Some(compile(&css)?) };
        Ok(Self {
            patterns: kept,
            css,
            compiled,
        })
    }

    /// Concaténation de plusieurs listes déjà validées.
    pub fn union(lists: &[&SelectorList]) -> Result<Self, RuleError> {
        let patterns: Vec<&str> = lists
            .iter()
            .flat_map(|list| list.patterns.iter().map(String::as_str))
            .collect();
        Self::from_patterns(&patterns)
    }

    pub fn compiled(&self) -> Option<&Selector> {
        self.compiled.as_ref()
    }

    pub fn as_css(&self) -> &str {
        &self.css
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Nombre de motifs (pas de sélecteurs : un motif peut contenir des virgules).
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

fn compile(pattern: &str) -> Result<Selector, RuleError> {
    if pattern.is_empty() {
        return Err(RuleError::InvalidSelector {
            selector: String::new(),
            reason: "empty selector".to_string(),
        });
    }
    Selector::parse(pattern).map_err(|e| RuleError::InvalidSelector {
        selector: pattern.to_string(),
        reason: e.to_string(),
    })
}
