//! Résolution du conteneur à supprimer à partir d'une feuille.
//!
//! Chaque passe décrit une échelle ([`Ladder`]) : une liste ordonnée de
//! stratégies, essayées de haut en bas. La première qui produit un élément
//! gagne. Le `<body>` et ses ancêtres ne sont jamais retournés.

use crate::dom::Dom;
use crate::selector::SelectorList;

/// Une ligne de l'échelle de résolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Ancêtre inclusif le plus proche qui matche.
    Closest(SelectorList),
    /// Enveloppe générique, ramenée au lien/bouton le plus proche si elle se
    /// trouve dans un repère de navigation (évite de vider la barre de nav).
    Wrapper {
        wrapper: SelectorList,
        landmarks: SelectorList,
        narrow_to: SelectorList,
    },
    /// Élément parent de la feuille.
    Parent,
    /// La feuille elle-même si sa balise est listée.
    ItselfIf(Vec<String>),
    /// La feuille elle-même.
    Itself,
}

pub type Ladder = Vec<Strategy>;

impl Strategy {
    pub fn resolve<D: Dom + ?Sized>(&self, dom: &D, leaf: &D::Node) -> Option<D::Node> {
        match self {
            Self::Closest(selectors) => closest_below_body(dom, leaf, selectors),
            Self::Wrapper {
                wrapper,
                landmarks,
                narrow_to,
            } => {
                let container = closest_below_body(dom, leaf, wrapper)?;
                if dom.closest(&container, landmarks).is_some() {
                    closest_below_body(dom, leaf, narrow_to)
                } else {
                    Some(container)
                }
            }
            Self::Parent => dom.parent(leaf).filter(|p| !is_body_or_above(dom, p)),
            Self::ItselfIf(tags) => {
                let tag = dom.tag_name(leaf);
                tags.iter()
                    .any(|t| t.eq_ignore_ascii_case(&tag))
                    .then(|| leaf.clone())
                    .filter(|n| !is_body_or_above(dom, n))
            }
            Self::Itself => Some(leaf.clone()).filter(|n| !is_body_or_above(dom, n)),
        }
    }
}

/// Parcourt l'échelle dans l'ordre et retourne le premier conteneur trouvé.
pub fn resolve_container<D: Dom + ?Sized>(
    dom: &D,
    leaf: &D::Node,
    ladder: &[Strategy],
) -> Option<D::Node> {
    ladder.iter().find_map(|strategy| strategy.resolve(dom, leaf))
}

/// `closest()` qui s'arrête avant le `<body>`.
fn closest_below_body<D: Dom + ?Sized>(
    dom: &D,
    node: &D::Node,
    selectors: &SelectorList,
) -> Option<D::Node> {
    dom.closest(node, selectors).filter(|n| !is_body_or_above(dom, n))
}

/// Vrai pour le `<body>` et tout élément qui le contient.
pub fn is_body_or_above<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    match dom.body() {
        Some(body) => dom.contains(node, &body),
        None => dom.parent(node).is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::Page;

    fn sel(s: &str) -> SelectorList {
        SelectorList::parse(s).unwrap()
    }

    fn flex_wrapper() -> Strategy {
        Strategy::Wrapper {
            wrapper: sel(r#"div[style*="flex"]"#),
            landmarks: sel(r#"nav, header, [role="navigation"]"#),
            narrow_to: sel(r#"a, div[role="button"]"#),
        }
    }

    #[test]
    fn test_priority_order_beats_proximity() {
        // "article" listé avant "li" : l'article englobant gagne.
        let page = Page::parse(r#"<div id="post" role="article"><li id="li"><a id="l"></a></li></div>"#);
        let link = page.find("#l").unwrap();

        let ladder = vec![
            Strategy::Closest(sel(r#"div[role="article"]"#)),
            Strategy::Closest(sel("li")),
        ];
        assert_eq!(resolve_container(&page, &link, &ladder), page.find("#post"));

        let reversed = vec![
            Strategy::Closest(sel("li")),
            Strategy::Closest(sel(r#"div[role="article"]"#)),
        ];
        assert_eq!(resolve_container(&page, &link, &reversed), page.find("#li"));
    }

    #[test]
    fn test_never_returns_body() {
        let page = Page::parse(r#"<a id="l"></a>"#);
        let body = page.body_id();
        let link = page.find("#l").unwrap();

        let ladder = vec![
            Strategy::Closest(sel("body")),
            Strategy::Closest(sel("html")),
            Strategy::Parent,
        ];
        assert_eq!(resolve_container(&page, &link, &ladder), None);
        assert_eq!(Strategy::Itself.resolve(&page, &body), None);
    }

    #[test]
    fn test_no_match_returns_none() {
        let page = Page::parse(r#"<span id="s"></span>"#);
        let span = page.find("#s").unwrap();
        let ladder = vec![Strategy::Closest(sel("li"))];
        assert_eq!(resolve_container(&page, &span, &ladder), None);
    }

    #[test]
    fn test_wrapper_outside_navigation_is_kept() {
        let page = Page::parse(r#"<div id="w" style="display: flex"><span id="s"></span></div>"#);
        let span = page.find("#s").unwrap();
        assert_eq!(flex_wrapper().resolve(&page, &span), page.find("#w"));
    }

    #[test]
    fn test_wrapper_inside_navigation_is_narrowed() {
        let page = Page::parse(
            r#"<div role="navigation">
                 <div style="display: flex"><a id="l" href="/watch/"><span id="s"></span></a></div>
               </div>"#,
        );
        let span = page.find("#s").unwrap();
        assert_eq!(flex_wrapper().resolve(&page, &span), page.find("#l"));
    }

    #[test]
    fn test_itself_if_tag() {
        let page = Page::parse(r#"<video id="v"></video><div id="d" data-video-id="1"></div>"#);
        let video = page.find("#v").unwrap();
        let div = page.find("#d").unwrap();

        let strategy = Strategy::ItselfIf(vec!["video".into(), "iframe".into()]);
        assert_eq!(strategy.resolve(&page, &video), Some(video));
        assert_eq!(strategy.resolve(&page, &div), None);
    }

    #[test]
    fn test_parent() {
        let page = Page::parse(r#"<div id="d"><a id="l"></a></div>"#);
        let link = page.find("#l").unwrap();
        assert_eq!(Strategy::Parent.resolve(&page, &link), page.find("#d"));
    }
}
