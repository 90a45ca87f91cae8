//! Moteur de suppression : les sept passes d'un balayage.
//!
//! Chaque passe est une ligne déclarative (`PassPlan`) : repères à
//! parcourir, feuilles à chercher, filtre texte éventuel, et échelle de
//! résolution. Un balayage ([`RemovalEngine::sweep`]) exécute toutes les
//! lignes sur une requête fraîche de l'arbre vivant.
//!
//! Garanties :
//!
//! - le `<body>` (et tout ce qui le contient) n'est jamais supprimé ;
//! - un repère de navigation ou de barre latérale n'est jamais supprimé en
//!   tant que conteneur ;
//! - une passe limitée à des repères ne supprime jamais un conteneur qui
//!   englobe le repère parcouru ;
//! - relancer `sweep()` sur une page déjà nettoyée ne supprime rien.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::dom::{Dom, NodeKey};
use crate::matcher::{Keywords, matches_any_selector};
use crate::resolver::{Ladder, Strategy, is_body_or_above, resolve_container};
use crate::rules::RuleTable;
use crate::selector::SelectorList;

/// Identifiant des passes, dans leur ordre d'exécution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Text,
    Href,
    Media,
    TopNavigation,
    Sidebar,
    Tab,
    SponsoredMedia,
}

impl Pass {
    pub const ALL: [Pass; 7] = [
        Pass::Text,
        Pass::Href,
        Pass::Media,
        Pass::TopNavigation,
        Pass::Sidebar,
        Pass::Tab,
        Pass::SponsoredMedia,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::Text => "text",
            Pass::Href => "href",
            Pass::Media => "media",
            Pass::TopNavigation => "top-navigation",
            Pass::Sidebar => "sidebar",
            Pass::Tab => "tab",
            Pass::SponsoredMedia => "sponsored-media",
        }
    }
}

/// Nombre de conteneurs supprimés par passe lors d'un balayage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    counts: [usize; 7],
}

impl SweepReport {
    pub fn removed(&self, pass: Pass) -> usize {
        self.counts[pass as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn add(&mut self, pass: Pass, count: usize) {
        self.counts[pass as usize] += count;
    }
}

/// Une ligne de la table des passes.
#[derive(Debug, Clone)]
struct PassPlan {
    pass: Pass,
    /// Repères dans lesquels chercher ; `None` = tout le `<body>`.
    scope: Option<SelectorList>,
    leaves: SelectorList,
    keyword_filter: bool,
    ladder: Ladder,
}

fn closest_each(ladder: &[SelectorList]) -> Ladder {
    ladder.iter().cloned().map(Strategy::Closest).collect()
}

/// Orchestrateur des passes.
#[derive(Debug, Clone)]
pub struct RemovalEngine {
    keywords: Keywords,
    plans: Vec<PassPlan>,
    /// Jamais retenus comme conteneur.
    landmarks: SelectorList,
}

impl RemovalEngine {
    pub fn new(rules: &RuleTable) -> Self {
        let c = &rules.containers;

        let mut text = closest_each(&c.text);
        text.push(Strategy::Wrapper {
            wrapper: c.text_wrapper.clone(),
            landmarks: c.text_wrapper_landmarks.clone(),
            narrow_to: c.text_wrapper_narrow_to.clone(),
        });

        let mut media = closest_each(&c.media);
        media.push(Strategy::ItselfIf(vec!["video".into(), "iframe".into()]));

        let mut navigation = closest_each(&c.navigation);
        navigation.push(Strategy::Parent);

        let mut sidebar = closest_each(&c.sidebar);
        sidebar.push(Strategy::Parent);

        let mut tab = closest_each(&c.tab);
        tab.push(Strategy::Itself);

        let plans = vec![
            PassPlan {
                pass: Pass::Text,
                scope: None,
                leaves: rules.text_leaves.clone(),
                keyword_filter: true,
                ladder: text,
            },
            PassPlan {
                pass: Pass::Href,
                scope: None,
                leaves: rules.video_links.clone(),
                keyword_filter: false,
                ladder: closest_each(&c.href),
            },
            PassPlan {
                pass: Pass::Media,
                scope: None,
                leaves: rules.media.clone(),
                keyword_filter: false,
                ladder: media,
            },
            PassPlan {
                pass: Pass::TopNavigation,
                scope: Some(rules.navigation_landmarks.clone()),
                leaves: rules.navigation_links.clone(),
                keyword_filter: false,
                ladder: navigation,
            },
            PassPlan {
                pass: Pass::Sidebar,
                scope: Some(rules.sidebar_landmarks.clone()),
                leaves: rules.sidebar_links.clone(),
                keyword_filter: false,
                ladder: sidebar,
            },
            PassPlan {
                pass: Pass::Sidebar,
                scope: Some(rules.sidebar_landmarks.clone()),
                leaves: rules.sidebar_text_leaves.clone(),
                keyword_filter: true,
                ladder: closest_each(&c.sidebar_text),
            },
            PassPlan {
                pass: Pass::Tab,
                scope: None,
                leaves: rules.tabs.clone(),
                keyword_filter: false,
                ladder: tab,
            },
            PassPlan {
                pass: Pass::SponsoredMedia,
                scope: None,
                leaves: rules.sponsored_media.clone(),
                keyword_filter: false,
                ladder: closest_each(&c.media),
            },
        ];

        Self {
            keywords: rules.keywords.clone(),
            plans,
            landmarks: rules.landmarks.clone(),
        }
    }

    /// Un balayage complet. Ne retourne qu'un rapport ; l'effet est sur le DOM.
    pub fn sweep<D: Dom>(&self, dom: &mut D) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(body) = dom.body() else {
            trace!("No <body> yet, sweep skipped");
            return report;
        };

        for plan in &self.plans {
            let removed = self.run_plan(dom, &body, plan);
            if removed > 0 {
                trace!(pass = plan.pass.name(), removed, "Pass removed containers");
            }
            report.add(plan.pass, removed);
        }

        if report.total() > 0 {
            debug!(
                removed = report.total(),
                text = report.removed(Pass::Text),
                href = report.removed(Pass::Href),
                media = report.removed(Pass::Media),
                navigation = report.removed(Pass::TopNavigation),
                sidebar = report.removed(Pass::Sidebar),
                tab = report.removed(Pass::Tab),
                sponsored = report.removed(Pass::SponsoredMedia),
                "Sweep complete"
            );
        }
        report
    }

    fn run_plan<D: Dom>(&self, dom: &mut D, body: &D::Node, plan: &PassPlan) -> usize {
        let scopes = match plan.scope {
            Some(ref landmarks) => dom.query_all(body, landmarks),
            None => vec![body.clone()],
        };

        let mut removed = 0;
        for scope in scopes {
            // A nested landmark may have gone with an earlier scope.
            if !dom.is_connected(&scope) {
                continue;
            }

            let containers = self.collect_containers(dom, &scope, plan);
            for container in containers {
                if self.remove(dom, &container) {
                    removed += 1;
                }
            }
        }
        removed
    }

    fn collect_containers<D: Dom>(&self, dom: &D, scope: &D::Node, plan: &PassPlan) -> Vec<D::Node> {
        let mut seen: HashSet<NodeKey> = HashSet::new();
        let mut containers = Vec::new();

        for leaf in dom.query_all(scope, &plan.leaves) {
            if plan.keyword_filter && !self.keywords.is_video_keyword_text(&dom.text_content(&leaf)) {
                continue;
            }
            let Some(container) = resolve_container(dom, &leaf, &plan.ladder) else {
                continue;
            };
            if plan.scope.is_some() && dom.contains(&container, scope) {
                continue;
            }
            if matches_any_selector(dom, &container, &self.landmarks) {
                trace!(pass = plan.pass.name(), "Container is a landmark, kept");
                continue;
            }
            if seen.insert(dom.key(&container)) {
                containers.push(container);
            }
        }
        containers
    }

    /// Masque puis détache. Masquer d'abord évite un flash si le détachement
    /// déclenche un layout.
    fn remove<D: Dom>(&self, dom: &mut D, container: &D::Node) -> bool {
        if is_body_or_above(&*dom, container) || !dom.is_connected(container) {
            return false;
        }
        dom.hide(container);
        dom.detach(container);
        true
    }
}
