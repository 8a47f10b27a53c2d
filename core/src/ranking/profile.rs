use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Largest meaningful shift for a coefficient.
pub const MAX_COEFFICIENT: u8 = 15;

/// Per-feature weights of the ranking.
///
/// Every coefficient is a left shift applied to the feature's `0..=256`
/// contribution before the contributions are summed. `authority` and
/// `reputation` only count once they exceed 12.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingProfile {
    pub domain_length: u8,
    pub reputation: u8,
    pub date: u8,
    pub words_in_title: u8,
    pub words_in_text: u8,
    pub phrases_in_text: u8,
    pub local_links: u8,
    pub other_links: u8,
    pub url_length: u8,
    pub url_components: u8,
    pub hit_count: u8,
    pub position_in_text: u8,
    pub position_of_phrase: u8,
    pub position_in_phrase: u8,
    pub word_distance: u8,
    pub app_url: u8,
    pub app_title: u8,
    pub app_creator: u8,
    pub app_subject: u8,
    pub app_description: u8,
    pub app_emphasized: u8,
    pub cat_index_of: u8,
    pub cat_has_image: u8,
    pub cat_has_audio: u8,
    pub cat_has_video: u8,
    pub cat_has_app: u8,
    pub term_frequency: u8,
    pub language: u8,
    pub authority: u8,
    /// Two-letter code that earns the language bonus.
    pub preferred_language: String,
}

impl Default for RankingProfile {
    fn default() -> Self {
        Self {
            domain_length: 11,
            reputation: 9,
            date: 0,
            words_in_title: 4,
            words_in_text: 2,
            phrases_in_text: 3,
            local_links: 2,
            other_links: 3,
            url_length: 14,
            url_components: 13,
            hit_count: 5,
            position_in_text: 7,
            position_of_phrase: 6,
            position_in_phrase: 1,
            word_distance: 15,
            app_url: 14,
            app_title: 14,
            app_creator: 12,
            app_subject: 13,
            app_description: 13,
            app_emphasized: 13,
            cat_index_of: 0,
            cat_has_image: 8,
            cat_has_audio: 8,
            cat_has_video: 8,
            cat_has_app: 8,
            term_frequency: 14,
            language: 13,
            authority: 13,
            preferred_language: "en".to_string(),
        }
    }
}

/// External names of the coefficients, in external-string order.
macro_rules! coefficient_table {
    ($($name:literal => $field:ident),* $(,)?) => {
        impl RankingProfile {
            fn coefficients_mut(&mut self) -> Vec<(&'static str, &mut u8)> {
                vec![$(($name, &mut self.$field)),*]
            }

            /// `(name, value)` pairs in external-string order.
            pub fn coefficients(&self) -> Vec<(&'static str, u8)> {
                vec![$(($name, self.$field)),*]
            }
        }
    };
}

coefficient_table! {
    "domlength" => domain_length,
    "ybr" => reputation,
    "date" => date,
    "wordsintitle" => words_in_title,
    "wordsintext" => words_in_text,
    "phrasesintext" => phrases_in_text,
    "llocal" => local_links,
    "lother" => other_links,
    "urllength" => url_length,
    "urlcomps" => url_components,
    "hitcount" => hit_count,
    "posintext" => position_in_text,
    "posofphrase" => position_of_phrase,
    "posinphrase" => position_in_phrase,
    "worddistance" => word_distance,
    "appurl" => app_url,
    "app_dc_title" => app_title,
    "app_dc_creator" => app_creator,
    "app_dc_subject" => app_subject,
    "app_dc_description" => app_description,
    "appemph" => app_emphasized,
    "catindexof" => cat_index_of,
    "cathasimage" => cat_has_image,
    "cathasaudio" => cat_has_audio,
    "cathasvideo" => cat_has_video,
    "cathasapp" => cat_has_app,
    "tf" => term_frequency,
    "language" => language,
    "authority" => authority,
}

impl RankingProfile {
    /// Every coefficient zero; useful as a base for hand-built profiles.
    pub fn zeroed() -> Self {
        let mut profile = Self::default();
        for (_, value) in profile.coefficients_mut() {
            *value = 0;
        }
        profile
    }

    /// Coefficients above the shift limit are clamped.
    pub fn clamped(mut self) -> Self {
        for (_, value) in self.coefficients_mut() {
            *value = (*value).min(MAX_COEFFICIENT);
        }
        self
    }
}

impl fmt::Display for RankingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.coefficients() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Parses `name=value,name=value`. Names not given keep their default, unknown
/// names are ignored and values are clamped to the shift limit.
impl FromStr for RankingProfile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut profile = Self::default();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            let Some(slot) = profile
                .coefficients_mut()
                .into_iter()
                .find(|(n, _)| *n == name)
                .map(|(_, slot)| slot)
            else {
                continue;
            };
            let parsed: u32 = value.parse().map_err(|_| ProfileError::InvalidCoefficient {
                name: name.to_string(),
                value: value.to_string(),
            })?;
            *slot = parsed.min(MAX_COEFFICIENT as u32) as u8;
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_form_round_trips() {
        let profile = RankingProfile {
            term_frequency: 4,
            app_title: 4,
            ..RankingProfile::zeroed()
        };
        let text = profile.to_string();
        assert!(text.starts_with("domlength=0,ybr=0,"));
        assert!(text.contains("tf=4"));
        let back: RankingProfile = text.parse().unwrap();
        assert_eq!(back, profile.clone().clamped());
        assert_eq!(back.app_title, 4);
    }

    #[test]
    fn parsing_clamps_and_skips_unknown_names() {
        let profile: RankingProfile = "tf=99, nosuchthing=3,authority=2".parse().unwrap();
        assert_eq!(profile.term_frequency, MAX_COEFFICIENT);
        assert_eq!(profile.authority, 2);
        assert_eq!(profile.word_distance, RankingProfile::default().word_distance);
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let err = "tf=high".parse::<RankingProfile>().unwrap_err();
        assert!(matches!(err, ProfileError::InvalidCoefficient { .. }));
    }

    #[test]
    fn zeroed_profile_has_no_weight() {
        assert!(RankingProfile::zeroed().coefficients().iter().all(|(_, v)| *v == 0));
        assert_eq!(RankingProfile::default().coefficients().len(), 29);
    }
}
