//! Plugin chain construction
//!
//! Plugin types arrive as strings from the UI and are resolved to a
//! `PluginKind` once, when the chain is built. Unknown names become unity
//! pass-through stages instead of failing.

use super::track::TrackId;
use crate::effects::{Compressor, Delay, Effect, EffectChain, Gate, Reverb, ShelfEQ, UtilityEffect};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Eq,
    Compressor,
    Gate,
    Delay,
    Reverb,
    Utility,
}

impl PluginKind {
    /// Resolve a plugin type name (case-insensitive); unknown names map to `Utility`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "eq" => PluginKind::Eq,
            "compressor" => PluginKind::Compressor,
            "gate" => PluginKind::Gate,
            "delay" => PluginKind::Delay,
            "reverb" => PluginKind::Reverb,
            _ => PluginKind::Utility,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Eq => "eq",
            PluginKind::Compressor => "compressor",
            PluginKind::Gate => "gate",
            PluginKind::Delay => "delay",
            PluginKind::Reverb => "reverb",
            PluginKind::Utility => "utility",
        }
    }

    /// Create a fresh processing stage of this kind
    pub fn create(&self) -> Box<dyn Effect> {
        match self {
            PluginKind::Eq => Box::new(ShelfEQ::new()),
            PluginKind::Compressor => Box::new(Compressor::new()),
            PluginKind::Gate => Box::new(Gate::new()),
            PluginKind::Delay => Box::new(Delay::new()),
            PluginKind::Reverb => Box::new(Reverb::new()),
            PluginKind::Utility => Box::new(UtilityEffect::new()),
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PluginChainRouter;

impl PluginChainRouter {
    /// Resolve a list of plugin type names, keeping their order
    pub fn resolve<S: AsRef<str>>(plugin_types: &[S]) -> Vec<PluginKind> {
        plugin_types
            .iter()
            .map(|name| {
                let kind = PluginKind::from_name(name.as_ref());
                if kind == PluginKind::Utility && !name.as_ref().eq_ignore_ascii_case("utility") {
                    log::debug!("Unknown plugin type '{}', using pass-through", name.as_ref());
                }
                kind
            })
            .collect()
    }

    /// Append one stage per plugin type to `source`, in list order
    ///
    /// Returns the extended chain; its last stage is the terminal node the
    /// caller connects onward.
    pub fn process_plugin_chain<S: AsRef<str>>(
        track_id: TrackId,
        source: EffectChain,
        plugin_types: &[S],
    ) -> EffectChain {
        Self::build(track_id, source, &Self::resolve(plugin_types))
    }

    /// Same as `process_plugin_chain` with already resolved kinds
    pub fn build(track_id: TrackId, mut source: EffectChain, kinds: &[PluginKind]) -> EffectChain {
        for kind in kinds {
            source.push(kind.create());
        }
        if !kinds.is_empty() {
            log::debug!("Track {} plugin chain: {:?}", track_id, kinds);
        }
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_resolve_case_insensitively() {
        assert_eq!(PluginKind::from_name("EQ"), PluginKind::Eq);
        assert_eq!(PluginKind::from_name("Compressor"), PluginKind::Compressor);
        assert_eq!(PluginKind::from_name(" reverb "), PluginKind::Reverb);
        assert_eq!(PluginKind::from_name("meter"), PluginKind::Utility);
        assert_eq!(PluginKind::from_name(""), PluginKind::Utility);
    }

    #[test]
    fn test_chain_keeps_list_order() {
        let chain = PluginChainRouter::process_plugin_chain(
            1,
            EffectChain::new(),
            &["gate", "eq", "delay", "compressor", "reverb", "utility"],
        );
        assert_eq!(chain.len(), 6);
        let names = chain.stage_names();
        assert_eq!(names[0], "Gate");
        assert_eq!(names[1], "EQ");
        assert_eq!(names[5], "Utility");
    }

    #[test]
    fn test_unknown_type_is_passthrough() {
        let mut chain =
            PluginChainRouter::process_plugin_chain(1, EffectChain::new(), &["meter", "spectral-wizard"]);
        assert_eq!(chain.len(), 2);
        let mut buffer = vec![0.25f32, -0.5, 0.75, -1.0];
        chain.process(&mut buffer, 2, 48000);
        assert_eq!(buffer, vec![0.25, -0.5, 0.75, -1.0]);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&[PluginKind::Eq, PluginKind::Gate]).unwrap();
        assert_eq!(json, r#"["eq","gate"]"#);
    }
}
