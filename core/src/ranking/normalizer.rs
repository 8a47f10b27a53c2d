use std::any::Any;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::NormalizerConfig;
use crate::error::RankingError;
use crate::order::{Base64Order, ByteOrder, LONG_MAX};
use crate::reference::{DocRef, Flag};

use super::profile::RankingProfile;
use super::stats::Statistics;
use super::{HostReputation, NoReputation};

/// Contribution of a present flag.
const FLAG_VALUE: u64 = 255;
/// Bonus for a host start page, weighted like URL length.
const ROOT_URL_VALUE: u64 = 15;
/// Authority and reputation only count above this coefficient.
const HEAVY_COEFFICIENT: u8 = 12;

/// Turns the raw features of a candidate set into one sort key per reference.
pub struct RankingNormalizer {
    profile: RankingProfile,
    config: NormalizerConfig,
    order: Base64Order,
    reputation: Arc<dyn HostReputation>,
}

impl RankingNormalizer {
    pub fn new(profile: RankingProfile, order: &Base64Order) -> Self {
        Self {
            profile: profile.clamped(),
            config: NormalizerConfig::default(),
            order: order.unrotated(),
            reputation: Arc::new(NoReputation),
        }
    }

    pub fn with_config(mut self, config: NormalizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reputation(mut self, reputation: Arc<dyn HostReputation>) -> Self {
        self.reputation = reputation;
        self
    }

    pub fn profile(&self) -> &RankingProfile {
        &self.profile
    }

    /// Min/max statistics of `entries`, split over two workers when the set is
    /// larger than the configured threshold.
    pub fn statistics(&self, entries: &[DocRef]) -> Result<Option<Statistics>, RankingError> {
        split_scan(entries, self.config.split_threshold, Statistics::scan)
    }

    /// `None` when there is nothing to rank.
    pub fn normalize(&self, entries: &[DocRef]) -> Result<Option<Ranking<'_>>, RankingError> {
        Ok(self.statistics(entries)?.map(|stats| Ranking {
            normalizer: self,
            stats,
        }))
    }

    /// Entries with their rank keys, best first.
    pub fn rank_all(&self, entries: Vec<DocRef>) -> Result<Vec<(u64, DocRef)>, RankingError> {
        match self.normalize(&entries)? {
            Some(ranking) => Ok(ranking.sort(entries)),
            None => Ok(Vec::new()),
        }
    }
}

fn split_scan<F>(
    entries: &[DocRef],
    threshold: usize,
    scan: F,
) -> Result<Option<Statistics>, RankingError>
where
    F: Fn(&[DocRef]) -> Option<Statistics> + Sync,
{
    if entries.len() <= threshold {
        return Ok(scan(entries));
    }
    let (left, right) = entries.split_at(entries.len() / 2);
    let (left, right) = rayon::join(
        || panic::catch_unwind(AssertUnwindSafe(|| scan(left))),
        || panic::catch_unwind(AssertUnwindSafe(|| scan(right))),
    );
    let left = left.map_err(worker_failed)?;
    let right = right.map_err(worker_failed)?;
    Ok(match (left, right) {
        (Some(l), Some(r)) => Some(l.combine(r)),
        (l, r) => l.or(r),
    })
}

fn worker_failed(payload: Box<dyn Any + Send>) -> RankingError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string());
    tracing::error!(%message, "min/max worker failed");
    RankingError::WorkerFailed(message)
}

/// `round(256 * (v - min) / (max - min))`, 0 when the bounds coincide.
fn normalized(value: u32, min: u32, max: u32) -> u64 {
    if max <= min {
        return 0;
    }
    let v = value.clamp(min, max);
    ((v - min) as f64 * 256.0 / (max - min) as f64).round() as u64
}

fn normalized_f64(value: f64, min: f64, max: f64) -> u64 {
    if min.is_nan() || max.is_nan() || max <= min {
        return 0;
    }
    let v = value.clamp(min, max);
    ((v - min) * 256.0 / (max - min)).round() as u64
}

/// Closer to the minimum is better.
fn inverted(value: u32, min: u32, max: u32) -> u64 {
    if max <= min {
        return 0;
    }
    256 - normalized(value, min, max)
}

fn patch_uk(code: &str) -> &str {
    if code == "uk" {
        "en"
    } else {
        code
    }
}

/// Rank function for one normalized candidate set.
pub struct Ranking<'n> {
    normalizer: &'n RankingNormalizer,
    stats: Statistics,
}

impl Ranking<'_> {
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Weighted sum of all contributions; higher is better.
    pub fn score(&self, entry: &DocRef) -> u64 {
        let p = &self.normalizer.profile;
        let (min, max) = (&self.stats.min, &self.stats.max);
        let url = &entry.metadata_hash;
        let host = url.host();

        let flag = |f: Flag, coefficient: u8| {
            if entry.has(f) {
                FLAG_VALUE << coefficient
            } else {
                0
            }
        };

        let mut r = 0u64;
        r += inverted(
            url.dom_length_normalized() as u32,
            min.domain_length,
            max.domain_length,
        ) << p.domain_length;
        if p.reputation > HEAVY_COEFFICIENT {
            let block_rank = self.normalizer.reputation.block_rank(&host).min(15) as u64;
            r += (256 - (block_rank << 4)) << p.reputation;
        }
        r += normalized(entry.url_components, min.url_components, max.url_components) << p.url_components;
        r += normalized(entry.url_length, min.url_length, max.url_length) << p.url_length;
        r += inverted(entry.min_position, min.min_position, max.max_position) << p.position_in_text;
        r += normalized(entry.position_of_phrase, min.position_of_phrase, max.position_of_phrase) << p.position_of_phrase;
        r += normalized(entry.position_in_phrase, min.position_in_phrase, max.position_in_phrase) << p.position_in_phrase;
        r += normalized(entry.word_distance, min.word_distance, max.word_distance) << p.word_distance;
        r += normalized(entry.virtual_age, min.virtual_age, max.virtual_age) << p.date;
        r += normalized(entry.words_in_title, min.words_in_title, max.words_in_title) << p.words_in_title;
        r += normalized(entry.words_in_text, min.words_in_text, max.words_in_text) << p.words_in_text;
        r += normalized(entry.phrases_in_text, min.phrases_in_text, max.phrases_in_text) << p.phrases_in_text;
        r += normalized(entry.local_links, min.local_links, max.local_links) << p.local_links;
        r += normalized(entry.other_links, min.other_links, max.other_links) << p.other_links;
        r += normalized(entry.hit_count, min.hit_count, max.hit_count) << p.hit_count;
        r += normalized_f64(entry.term_frequency, min.term_frequency, max.term_frequency) << p.term_frequency;
        if p.authority > HEAVY_COEFFICIENT {
            r += self.stats.authority(&host) << p.authority;
        }
        r += flag(Flag::InUrl, p.app_url);
        r += flag(Flag::InTitle, p.app_title);
        r += flag(Flag::InCreator, p.app_creator);
        r += flag(Flag::InSubject, p.app_subject);
        r += flag(Flag::InDescription, p.app_description);
        r += flag(Flag::Emphasized, p.app_emphasized);
        r += flag(Flag::IndexOf, p.cat_index_of);
        r += flag(Flag::HasImage, p.cat_has_image);
        r += flag(Flag::HasAudio, p.cat_has_audio);
        r += flag(Flag::HasVideo, p.cat_has_video);
        r += flag(Flag::HasApp, p.cat_has_app);
        if patch_uk(entry.language()) == p.preferred_language {
            r += FLAG_VALUE << p.language;
        }
        if url.probably_root_url() {
            r += ROOT_URL_VALUE << p.url_length;
        }
        r
    }

    /// Sort key: ascending keys list the best references first.
    pub fn rank(&self, entry: &DocRef) -> u64 {
        LONG_MAX - self.score(entry)
    }

    /// Entries ordered by rank key; equal keys fall back to metadata hash order.
    pub fn sort(&self, entries: Vec<DocRef>) -> Vec<(u64, DocRef)> {
        let order = &self.normalizer.order;
        let mut ranked: Vec<(u64, DocRef)> = entries
            .into_iter()
            .map(|e| (self.rank(&e), e))
            .collect();
        ranked.sort_by(|(ka, a), (kb, b)| {
            ka.cmp(kb).then_with(|| {
                order.compare(a.metadata_hash.as_bytes(), b.metadata_hash.as_bytes())
            })
        });
        ranked
    }

    pub fn compare(&self, a: &DocRef, b: &DocRef) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::UrlHash;
    use crate::ranking::ReputationTable;

    fn order() -> Base64Order {
        Base64Order::enhanced(true)
    }

    fn doc(url: &str) -> DocRef {
        DocRef::new(UrlHash::new(url.as_bytes()).unwrap())
    }

    #[test]
    fn normalization_bounds() {
        assert_eq!(normalized(5, 5, 5), 0);
        assert_eq!(normalized(0, 0, 10), 0);
        assert_eq!(normalized(10, 0, 10), 256);
        assert_eq!(normalized(5, 0, 10), 128);
        assert_eq!(normalized(1, 0, 3), 85);
        assert_eq!(inverted(0, 0, 10), 256);
        assert_eq!(inverted(3, 3, 3), 0);
        assert_eq!(normalized_f64(0.9, 0.1, 0.9), 256);
    }

    #[test]
    fn title_and_term_frequency_win() {
        let profile = RankingProfile {
            term_frequency: 4,
            app_title: 4,
            ..RankingProfile::zeroed()
        };
        let normalizer = RankingNormalizer::new(profile, &order());
        let mut a = doc("AAAAAAhost01");
        a.term_frequency = 0.9;
        a.flags.insert(Flag::InTitle);
        let mut b = doc("BBBBBBhost01");
        b.term_frequency = 0.1;
        let entries = vec![b.clone(), a.clone()];
        let ranking = normalizer.normalize(&entries).unwrap().unwrap();
        assert!(ranking.rank(&a) < ranking.rank(&b));
        assert_eq!(ranking.compare(&a, &b), Ordering::Less);
        let sorted = normalizer.rank_all(entries).unwrap();
        assert_eq!(sorted[0].1, a);
    }

    #[test]
    fn single_candidate_keeps_only_flag_contributions() {
        let profile = RankingProfile {
            authority: 0,
            ..RankingProfile::zeroed()
        };
        let normalizer = RankingNormalizer::new(profile, &order());
        let mut only = doc("AAAAAAhost01");
        only.hit_count = 40;
        only.term_frequency = 0.7;
        only.set_language("de");
        let ranking = normalizer.normalize(std::slice::from_ref(&only)).unwrap().unwrap();
        assert_eq!(ranking.score(&only), 0);
        only.flags.insert(Flag::HasImage);
        assert_eq!(ranking.score(&only), 255);
    }

    #[test]
    fn heavy_authority_rewards_common_hosts() {
        let profile = RankingProfile {
            authority: 13,
            ..RankingProfile::zeroed()
        };
        let normalizer = RankingNormalizer::new(profile, &order());
        // same flag symbol, so host length does not separate them
        let entries = vec![doc("AAAAAAhostAA"), doc("BBBBBAhostAA"), doc("CCCCCAhostBB")];
        let ranking = normalizer.normalize(&entries).unwrap().unwrap();
        assert!(ranking.rank(&entries[0]) < ranking.rank(&entries[2]));

        let light = RankingNormalizer::new(
            RankingProfile { authority: 12, ..RankingProfile::zeroed() },
            &order(),
        );
        let ranking = light.normalize(&entries).unwrap().unwrap();
        assert_eq!(ranking.rank(&entries[0]), ranking.rank(&entries[2]));
    }

    #[test]
    fn reputation_counts_above_threshold() {
        let good = doc("AAAAAAhostAA");
        let bad = doc("BBBBBAhostBB");
        let table: ReputationTable = [(good.metadata_hash.host(), 0u8)].into_iter().collect();
        let normalizer = RankingNormalizer::new(
            RankingProfile { reputation: 13, ..RankingProfile::zeroed() },
            &order(),
        )
        .with_reputation(Arc::new(table));
        let entries = vec![good.clone(), bad.clone()];
        let ranking = normalizer.normalize(&entries).unwrap().unwrap();
        assert_eq!(ranking.score(&good) - ranking.score(&bad), (256 - 16) << 13);
    }

    #[test]
    fn uk_counts_as_english() {
        let normalizer = RankingNormalizer::new(
            RankingProfile { language: 2, ..RankingProfile::zeroed() },
            &order(),
        );
        let mut uk = doc("AAAAAAhost01");
        uk.set_language("uk");
        let ranking = normalizer.normalize(std::slice::from_ref(&uk)).unwrap().unwrap();
        assert_eq!(ranking.score(&uk), 255 << 2);
    }

    #[test]
    fn empty_candidates_rank_nothing() {
        let normalizer = RankingNormalizer::new(RankingProfile::default(), &order());
        assert!(normalizer.normalize(&[]).unwrap().is_none());
        assert!(normalizer.rank_all(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn panicking_worker_fails_the_whole_scan() {
        let entries: Vec<DocRef> = (0..10).map(|i| doc(&format!("AAAAA{i}host01"))).collect();
        let err = split_scan(&entries, 4, |part| {
            if part.len() < 10 {
                panic!("scan exploded");
            }
            None
        })
        .unwrap_err();
        assert!(matches!(err, RankingError::WorkerFailed(ref m) if m.contains("scan exploded")));
    }

    #[test]
    fn split_statistics_match_one_scan() {
        let entries: Vec<DocRef> = (0..40)
            .map(|i| {
                let mut e = doc(&format!("AAAA{i:02}host{:02}", i % 3));
                e.hit_count = i * 13 % 7;
                e.min_position = i;
                e
            })
            .collect();
        let normalizer = RankingNormalizer::new(RankingProfile::default(), &order())
            .with_config(NormalizerConfig { split_threshold: 8 });
        let split = normalizer.statistics(&entries).unwrap().unwrap();
        assert_eq!(split, Statistics::scan(&entries).unwrap());
        assert_eq!(split.entries, 40);
    }
}
