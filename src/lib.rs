//! # Video Blocker — filtre de contenu vidéo pour Facebook
//!
//! Content script compilé en WebAssembly : supprime de la page les
//! publications vidéo, les reels, les onglets et raccourcis "Watch", et
//! renvoie vers l'accueil toute navigation vers une route vidéo.
//!
//! ## Architecture des modules
//!
//! - [`config`] : Règles et délais, chargés depuis `rules.toml` embarqué.
//!   Valeurs par défaut codées en dur si le fichier est invalide.
//!
//! - [`rules`] : Compilation de la configuration en [`rules::RuleTable`]
//!   (sélecteurs parsés, URL de redirection validée).
//!
//! - [`selector`] : Listes de sélecteurs CSS des règles, validées par
//!   `scraper` au chargement.
//!
//! - [`dom`] : Traits d'accès au document et à la navigation. Le moteur ne
//!   dépend que de ces traits.
//!
//! - [`matcher`] / [`resolver`] : Tests sur le texte et les sélecteurs ;
//!   remontée d'une feuille vers le conteneur à supprimer.
//!
//! - [`engine`] : Les passes de suppression d'un balayage.
//!
//! - [`guard`] : Redirection hors des routes vidéo.
//!
//! - [`intercept`] : Blocage des clics sur les liens vidéo restants.
//!
//! - [`scheduler`] / [`controller`] : Quand relancer quoi (sondage d'URL,
//!   debounce des mutations, balayage de secours) et câblage de l'ensemble.
//!
//! - [`headless`] : Document `scraper` en mémoire pour les tests et les
//!   embedders natifs.
//!
//! - `web` (wasm32 uniquement) : Backend `web-sys` et point d'entrée du
//!   content script.

pub mod config;
pub mod controller;
pub mod dom;
pub mod engine;
pub mod error;
pub mod guard;
pub mod headless;
pub mod intercept;
pub mod logging;
pub mod matcher;
pub mod resolver;
pub mod rules;
pub mod scheduler;
pub mod selector;

#[cfg(target_arch = "wasm32")]
pub mod web;
