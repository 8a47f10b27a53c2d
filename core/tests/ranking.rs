use proptest::prelude::*;
use rwi_core::{
    Base64Order, DocRef, Flag, NormalizerConfig, RankingNormalizer, RankingProfile, UrlHash,
};

const SYMBOLS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn order() -> Base64Order {
    Base64Order::enhanced(true)
}

/// Small deterministic generator so large candidate sets stay cheap to build.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u32 {
        (self.next() % n) as u32
    }
}

fn candidates(seed: u64, n: usize) -> Vec<DocRef> {
    let mut rng = Lcg(seed);
    (0..n)
        .map(|i| {
            let mut key = [b'A'; 12];
            for (slot, digit) in key[..5].iter_mut().zip([i >> 24, i >> 18, i >> 12, i >> 6, i]) {
                *slot = SYMBOLS[digit & 63];
            }
            key[5] = SYMBOLS[rng.below(16) as usize];
            for slot in &mut key[6..] {
                *slot = SYMBOLS[rng.below(4) as usize];
            }
            let mut entry = DocRef::new(UrlHash::new(&key).unwrap());
            entry.term_frequency = rng.below(1000) as f64 / 1000.0;
            entry.url_length = 10 + rng.below(90);
            entry.url_components = rng.below(12);
            entry.min_position = rng.below(500);
            entry.max_position = entry.min_position + rng.below(500);
            entry.position_of_phrase = rng.below(40);
            entry.position_in_phrase = rng.below(20);
            entry.word_distance = rng.below(30);
            entry.virtual_age = 18_000 + rng.below(2_000);
            entry.words_in_title = rng.below(15);
            entry.words_in_text = rng.below(5_000);
            entry.phrases_in_text = rng.below(300);
            entry.local_links = rng.below(50);
            entry.other_links = rng.below(50);
            entry.hit_count = rng.below(40);
            if rng.below(3) == 0 {
                entry.flags.insert(Flag::InTitle);
            }
            if rng.below(2) == 0 {
                entry.set_language("de");
            }
            entry
        })
        .collect()
}

fn normalizer(split_threshold: usize) -> RankingNormalizer {
    RankingNormalizer::new(RankingProfile::default(), &order())
        .with_config(NormalizerConfig { split_threshold })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn split_and_single_scans_agree(
        seed in any::<u64>(),
        size in prop::sample::select(vec![0usize, 1, 599, 600, 1200]),
        split_threshold in prop::sample::select(vec![0usize, 600]),
    ) {
        let entries = candidates(seed, size);
        let single = normalizer(usize::MAX);
        let split = normalizer(split_threshold);

        let single_stats = single.statistics(&entries).unwrap();
        let split_stats = split.statistics(&entries).unwrap();
        prop_assert_eq!(&single_stats, &split_stats);
        if size == 0 {
            prop_assert!(single_stats.is_none());
            return Ok(());
        }

        let a = single.normalize(&entries).unwrap().unwrap();
        let b = split.normalize(&entries).unwrap().unwrap();
        for entry in &entries {
            prop_assert_eq!(a.rank(entry), b.rank(entry));
        }
    }

    #[test]
    fn raising_a_feature_never_lowers_the_score(
        seed in any::<u64>(),
        target in 0usize..50,
        feature in 0usize..6,
        delta in 1u32..200,
    ) {
        let entries = candidates(seed, 50);
        let normalizer = normalizer(600);
        let before = normalizer.normalize(&entries).unwrap().unwrap().score(&entries[target]);

        let mut raised = entries.clone();
        let e = &mut raised[target];
        match feature {
            0 => e.hit_count += delta,
            1 => e.words_in_title += delta,
            2 => e.word_distance += delta,
            3 => e.local_links += delta,
            4 => e.url_components += delta,
            _ => e.term_frequency += delta as f64 / 100.0,
        }
        let after = normalizer.normalize(&raised).unwrap().unwrap().score(&raised[target]);
        prop_assert!(after >= before, "score fell from {} to {}", before, after);
    }
}

#[test]
fn title_and_frequency_put_the_better_document_first() {
    let profile = RankingProfile {
        term_frequency: 4,
        app_title: 4,
        ..RankingProfile::zeroed()
    };
    let normalizer = RankingNormalizer::new(profile, &order());

    let mut a = DocRef::new(UrlHash::new(b"AAAAAAhost01").unwrap());
    a.term_frequency = 0.9;
    a.flags.insert(Flag::InTitle);
    let mut b = DocRef::new(UrlHash::new(b"BBBBBAhost02").unwrap());
    b.term_frequency = 0.1;

    let ranking = normalizer.normalize(&[a.clone(), b.clone()]).unwrap().unwrap();
    assert!(ranking.rank(&a) < ranking.rank(&b));

    let ranked = normalizer.rank_all(vec![b, a.clone()]).unwrap();
    assert_eq!(ranked[0].1, a);
}

#[test]
fn nothing_to_rank_yields_no_ranking() {
    let normalizer = normalizer(600);
    assert!(normalizer.normalize(&[]).unwrap().is_none());
    assert!(normalizer.rank_all(Vec::new()).unwrap().is_empty());
}
