//! Speaker identity bookkeeping: display names, anonymous-name allocation,
//! and deterministic color assignment.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

/// Display palette. Indexed by [`SpeakerRegistry::color_index`].
pub const PALETTE: [&str; 6] = [
    "#7c6ff0", "#6ec1e4", "#e4c76e", "#7ce4a1", "#e47070", "#b070e4",
];

const ANON_NAMES: [&str; 40] = [
    "Alex", "Blake", "Casey", "Dana", "Eden", "Finn", "Gray", "Harper", //
    "Ivy", "Jay", "Kit", "Lane", "Morgan", "Noel", "Oak", "Parker", //
    "Quinn", "Ray", "Sam", "Tate", "Val", "Wren", "Zara", "Sage", //
    "Ash", "Brook", "Drew", "Ellis", "Fern", "Glen", "Haven", "Jade", //
    "Kai", "Lark", "Maple", "Nico", "Olive", "Pax", "Reed", "Sky",
];

/// Diarization placeholder names ("speaker_1", "Speaker 2", ...) are never
/// treated as real names.
fn is_placeholder_name(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^speaker[_ ]\d+$").expect("placeholder pattern is valid"))
        .is_match(name)
}

#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    pub display_name: String,
    /// True until a human or the diarization service supplies a real name.
    pub auto_generated: bool,
    pub persisted_id: Option<i64>,
}

/// Owns the mapping from diarization speaker identifiers to display names.
///
/// Invariants: every identifier seen in a message has exactly one profile;
/// a manual rename is sticky and can never be overwritten by diarization
/// output; color indices follow identifier insertion order and stay stable
/// for the session.
#[derive(Debug, Default)]
pub struct SpeakerRegistry {
    profiles: HashMap<String, SpeakerProfile>,
    order: Vec<String>,
    used_anon: HashSet<String>,
}

impl SpeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an anonymous display name, preferring pool names not yet used
    /// this session. Once the pool is exhausted, any pool name gets a random
    /// two-digit suffix to keep collisions unlikely. Never empty.
    pub fn pick_anonymous_name(&mut self) -> String {
        let mut rng = rand::thread_rng();
        let available: Vec<&str> = ANON_NAMES
            .iter()
            .filter(|n| !self.used_anon.contains(**n))
            .copied()
            .collect();

        let name = if available.is_empty() {
            let base = ANON_NAMES[rng.gen_range(0..ANON_NAMES.len())];
            format!("{base}{}", rng.gen_range(0..99u8))
        } else {
            available[rng.gen_range(0..available.len())].to_string()
        };

        self.used_anon.insert(name.clone());
        name
    }

    /// Fold a diarization speaker map into the registry.
    ///
    /// Unknown identifiers are registered with the incoming name, or with a
    /// fresh anonymous name when the incoming one is empty or a placeholder.
    /// Known identifiers are only upgraded when they still carry an
    /// auto-generated name and the incoming name is real; human-confirmed
    /// names are never touched.
    pub fn absorb(&mut self, speakers: &HashMap<String, String>) {
        // Sorted for deterministic registration order (and thus colors);
        // JSON object order is not reliable.
        let mut ids: Vec<&String> = speakers.keys().collect();
        ids.sort();

        for id in ids {
            let name = &speakers[id];
            if !self.profiles.contains_key(id) {
                let (display_name, auto_generated) =
                    if name.is_empty() || is_placeholder_name(name) {
                        (self.pick_anonymous_name(), true)
                    } else {
                        (name.clone(), false)
                    };
                self.insert(id.clone(), display_name, auto_generated, None);
            } else if !name.is_empty() && !is_placeholder_name(name) {
                if let Some(profile) = self.profiles.get_mut(id) {
                    if profile.auto_generated {
                        profile.display_name = name.clone();
                        profile.auto_generated = false;
                    }
                }
            }
        }
    }

    /// Register or overwrite a profile wholesale. Used when resuming a
    /// persisted conversation, where names and auto-generated flags were
    /// decided in an earlier session.
    pub fn seed(
        &mut self,
        id: impl Into<String>,
        display_name: impl Into<String>,
        auto_generated: bool,
        persisted_id: Option<i64>,
    ) {
        let id = id.into();
        match self.profiles.get_mut(&id) {
            Some(profile) => {
                profile.display_name = display_name.into();
                profile.auto_generated = auto_generated;
                if persisted_id.is_some() {
                    profile.persisted_id = persisted_id;
                }
            }
            None => self.insert(id, display_name.into(), auto_generated, persisted_id),
        }
    }

    /// Set a human-confirmed display name. Clears the auto-generated flag
    /// and returns the previous name so the caller can persist the rename.
    pub fn rename(&mut self, id: &str, new_name: &str) -> Option<String> {
        match self.profiles.get_mut(id) {
            Some(profile) => {
                let old = std::mem::replace(&mut profile.display_name, new_name.to_string());
                profile.auto_generated = false;
                Some(old)
            }
            None => {
                self.insert(id.to_string(), new_name.to_string(), false, None);
                None
            }
        }
    }

    /// Resolve a free-text speaker reference to a display name.
    ///
    /// Tries an exact identifier or display-name match, then a normalized
    /// identifier (lowercase, spaces to underscores), and falls back to the
    /// input unchanged. Never fails.
    pub fn resolve(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        for id in &self.order {
            let profile = &self.profiles[id];
            if id.as_str() == raw || profile.display_name == raw {
                return profile.display_name.clone();
            }
        }
        let normalized = raw.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_");
        if let Some(profile) = self.profiles.get(&normalized) {
            return profile.display_name.clone();
        }
        raw.to_string()
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.profiles.get(id).map(|p| p.display_name.as_str())
    }

    pub fn profile(&self, id: &str) -> Option<&SpeakerProfile> {
        self.profiles.get(id)
    }

    /// Palette index for a speaker reference (identifier or display name).
    ///
    /// Registered identifiers use their insertion-order index, so colors are
    /// stable for the session. Unregistered references hash their lowercase
    /// character codes so ephemeral strings still render consistently.
    pub fn color_index(&self, reference: &str) -> usize {
        if let Some(pos) = self.order.iter().position(|id| id.as_str() == reference) {
            return pos % PALETTE.len();
        }
        let lower = reference.to_lowercase();
        if let Some(pos) = self
            .order
            .iter()
            .position(|id| self.profiles[id].display_name.to_lowercase() == lower)
        {
            return pos % PALETTE.len();
        }
        let sum: usize = lower.chars().map(|c| c as usize).sum();
        sum % PALETTE.len()
    }

    pub fn color_for(&self, reference: &str) -> &'static str {
        PALETTE[self.color_index(reference)]
    }

    /// Identifier → display name snapshot, in registration order.
    pub fn names(&self) -> HashMap<String, String> {
        self.profiles
            .iter()
            .map(|(id, p)| (id.clone(), p.display_name.clone()))
            .collect()
    }

    pub fn auto_gen_map(&self) -> HashMap<String, bool> {
        self.profiles
            .iter()
            .map(|(id, p)| (id.clone(), p.auto_generated))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn reset(&mut self) {
        self.profiles.clear();
        self.order.clear();
        self.used_anon.clear();
    }

    fn insert(
        &mut self,
        id: String,
        display_name: String,
        auto_generated: bool,
        persisted_id: Option<i64>,
    ) {
        self.order.push(id.clone());
        self.profiles.insert(
            id,
            SpeakerProfile {
                display_name,
                auto_generated,
                persisted_id,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn placeholder_names_trigger_anonymous_assignment() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "speaker_1"), ("speaker_2", "Speaker 2")]));

        for id in ["speaker_1", "speaker_2"] {
            let p = reg.profile(id).unwrap();
            assert!(p.auto_generated);
            assert!(!is_placeholder_name(&p.display_name));
            assert!(!p.display_name.is_empty());
        }
    }

    #[test]
    fn empty_names_trigger_anonymous_assignment() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "")]));
        let p = reg.profile("speaker_1").unwrap();
        assert!(p.auto_generated);
        assert!(!p.display_name.is_empty());
    }

    #[test]
    fn real_name_upgrades_auto_generated_profile() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "")]));
        reg.absorb(&map(&[("speaker_1", "Alice")]));
        let p = reg.profile("speaker_1").unwrap();
        assert_eq!(p.display_name, "Alice");
        assert!(!p.auto_generated);
    }

    #[test]
    fn absorb_never_overwrites_human_confirmed_names() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "")]));
        reg.rename("speaker_1", "Dr. Chen");
        reg.absorb(&map(&[("speaker_1", "Alice")]));
        assert_eq!(reg.display_name("speaker_1"), Some("Dr. Chen"));
    }

    #[test]
    fn absorb_never_replaces_real_name_with_placeholder() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "Alice")]));
        reg.absorb(&map(&[("speaker_1", "speaker_1")]));
        assert_eq!(reg.display_name("speaker_1"), Some("Alice"));
    }

    #[test]
    fn anonymous_names_are_unique_until_pool_exhausted() {
        let mut reg = SpeakerRegistry::new();
        let mut seen = HashSet::new();
        for _ in 0..40 {
            let name = reg.pick_anonymous_name();
            assert!(seen.insert(name), "pool name repeated before exhaustion");
        }
        // 41st pick still yields something non-empty
        assert!(!reg.pick_anonymous_name().is_empty());
    }

    #[test]
    fn rename_returns_previous_name() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "Alice")]));
        assert_eq!(reg.rename("speaker_1", "Alicia"), Some("Alice".into()));
        assert_eq!(reg.rename("speaker_9", "Zed"), None);
    }

    #[test]
    fn resolve_matches_id_name_and_normalized_forms() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("jane_doe", "Jane Doe")]));
        assert_eq!(reg.resolve("jane_doe"), "Jane Doe");
        assert_eq!(reg.resolve("Jane Doe"), "Jane Doe");
        assert_eq!(reg.resolve("JANE DOE"), "Jane Doe");
        assert_eq!(reg.resolve("nobody"), "nobody");
        assert_eq!(reg.resolve(""), "");
    }

    #[test]
    fn colors_follow_insertion_order() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "Alice")]));
        reg.absorb(&map(&[("speaker_2", "Bob")]));
        assert_eq!(reg.color_index("speaker_1"), 0);
        assert_eq!(reg.color_index("speaker_2"), 1);
        // display-name lookup lands on the same color as the id
        assert_eq!(reg.color_index("Bob"), 1);
    }

    #[test]
    fn unregistered_reference_gets_a_stable_hashed_color() {
        let reg = SpeakerRegistry::new();
        assert_eq!(reg.color_index("ghost"), reg.color_index("ghost"));
        assert!(reg.color_index("ghost") < PALETTE.len());
    }

    #[test]
    fn reset_clears_profiles_and_used_names() {
        let mut reg = SpeakerRegistry::new();
        reg.absorb(&map(&[("speaker_1", "")]));
        reg.reset();
        assert!(reg.is_empty());
        assert!(reg.names().is_empty());
    }
}
