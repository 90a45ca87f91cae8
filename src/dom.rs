//! Abstraction du document hôte.
//!
//! Le moteur de filtrage ne parle jamais directement à `web-sys` : il passe
//! par le trait [`Dom`], implémenté par :
//!
//! - `web::WebDom` : le vrai DOM du navigateur (cible wasm32), qui délègue
//!   `matches`/`closest`/`querySelectorAll` au navigateur ;
//! - [`crate::headless::Page`] : un document `scraper` en mémoire, utilisé par
//!   les tests et par les embedders natifs.
//!
//! Aucune référence à un élément n'est conservée d'un passage à l'autre,
//! sauf dans le registre du [`crate::intercept::ClickInterceptor`], qui
//! s'appuie sur [`NodeKey`] pour l'identité.

use std::fmt;

use crate::selector::SelectorList;

/// Identité stable d'un élément, valable tant que l'élément existe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

/// Événement de clic tel que vu par un handler capturant.
pub trait ClickEvent {
    fn prevent_default(&mut self);
    fn stop_propagation(&mut self);
}

/// Handler de clic enregistré en phase de capture.
pub type ClickHandler = Box<dyn FnMut(&mut dyn ClickEvent)>;

/// Accès en lecture/écriture à l'arbre d'éléments de la page.
///
/// Toutes les lectures sont "trouver ou rien" : un attribut absent, un parent
/// manquant ou un élément déjà détaché ne sont jamais des erreurs.
pub trait Dom {
    type Node: Clone + PartialEq + fmt::Debug;

    /// Élément `<body>`, s'il est déjà disponible.
    fn body(&self) -> Option<Self::Node>;

    fn key(&self, node: &Self::Node) -> NodeKey;

    /// Nom de balise en minuscules.
    fn tag_name(&self, node: &Self::Node) -> String;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Texte concaténé de l'élément et de ses descendants.
    fn text_content(&self, node: &Self::Node) -> String;

    /// Élément parent (jamais un nœud document).
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Descendants de `scope` en ordre document, `scope` exclu.
    fn descendants(&self, scope: &Self::Node) -> Vec<Self::Node>;

    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Passe l'élément en `display: none`.
    fn hide(&mut self, node: &Self::Node);

    /// Retire l'élément de l'arbre.
    fn detach(&mut self, node: &Self::Node);

    /// Enregistre un handler de clic en phase de capture.
    fn listen_click(&mut self, node: &Self::Node, handler: ClickHandler);

    /// Libère les handlers enregistrés par [`Dom::listen_click`].
    fn unlisten_click(&mut self, node: &Self::Node);

    /// Vrai si l'élément satisfait au moins un sélecteur de la liste.
    fn matches(&self, node: &Self::Node, selectors: &SelectorList) -> bool;

    /// Éléments sous `scope` (exclu) qui satisfont la liste, en ordre document.
    ///
    /// L'implémentation par défaut filtre [`Dom::descendants`].
    fn query_all(&self, scope: &Self::Node, selectors: &SelectorList) -> Vec<Self::Node> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.matches(node, selectors))
            .collect()
    }

    /// Ancêtre inclusif le plus proche qui satisfait la liste.
    fn closest(&self, node: &Self::Node, selectors: &SelectorList) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.matches(&candidate, selectors) {
                return Some(candidate);
            }
            current = self.parent(&candidate);
        }
        None
    }

    /// `true` si `ancestor` est `node` ou l'un de ses ancêtres.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }
}

/// Accès à la navigation de la page.
pub trait Navigator {
    /// Adresse complète courante.
    fn href(&self) -> String;

    /// Navigation sans entrée d'historique.
    fn replace(&self, url: &str);
}
