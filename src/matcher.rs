//! Prédicats purs : un élément feuille est-il "vidéo" ?

use crate::dom::Dom;
use crate::selector::SelectorList;

/// Ensemble de mots-clés normalisés (trim + minuscules).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords(Vec<String>);

impl Keywords {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(keywords.len());
        for keyword in keywords.iter().map(|k| normalize(k.as_ref())) {
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        Self(normalized)
    }

    /// Vrai si le texte normalisé est un mot-clé, commence par `"<mot> "`
    /// ou finit par `" <mot>"`. "videography" ne matche donc pas "video".
    pub fn is_video_keyword_text(&self, text: &str) -> bool {
        let text = normalize(text);
        if text.is_empty() {
            return false;
        }
        self.0.iter().any(|keyword| {
            text == *keyword
                || text
                    .strip_prefix(keyword.as_str())
                    .is_some_and(|rest| rest.starts_with(' '))
                || text
                    .strip_suffix(keyword.as_str())
                    .is_some_and(|rest| rest.ends_with(' '))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Vrai si l'élément satisfait au moins un motif de la liste.
pub fn matches_any_selector<D: Dom + ?Sized>(
    dom: &D,
    node: &D::Node,
    patterns: &SelectorList,
) -> bool {
    dom.matches(node, patterns)
}
