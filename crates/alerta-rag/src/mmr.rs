//! Maximal Marginal Relevance re-ranking
//!
//! Greedily selects candidates that are relevant to the query but not
//! redundant with what was already picked:
//!
//! `score(j) = λ·sim(j, q) − (1 − λ)·max_{s ∈ selected} sim(j, s)`
//!
//! The first pick is always the most similar candidate. Ties go to the
//! lowest candidate index, so a given input always yields the same order.

use alerta_vector::dot;

/// Default relevance/diversity trade-off
pub const DEFAULT_LAMBDA: f32 = 0.5;

/// One selected candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrSelection {
    /// Position in the candidate slice
    pub index: usize,
    /// Inner product with the query
    pub similarity: f32,
    /// Marginal score at the round it was picked
    pub score: f32,
}

/// Select up to `k` candidates by Maximal Marginal Relevance
///
/// `lambda` is clamped to `[0, 1]`; `1.0` degenerates to plain top-k by
/// similarity and `0.0` only penalizes redundancy after the first pick.
/// Returns fewer than `k` selections when the candidates run out.
pub fn mmr_select<V: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[V],
    k: usize,
    lambda: f32,
) -> Vec<MmrSelection> {
    let n = candidates.len();
    let target = k.min(n);
    if target == 0 {
        return Vec::new();
    }

    let lambda = if lambda.is_nan() {
        DEFAULT_LAMBDA
    } else {
        lambda.clamp(0.0, 1.0)
    };

    let similarities: Vec<f32> = candidates.iter().map(|v| dot(v.as_ref(), query)).collect();

    // closest similarity to the selected set, updated after every pick
    let mut redundancy = vec![f32::NEG_INFINITY; n];
    let mut selected = vec![false; n];
    let mut picks = Vec::with_capacity(target);

    while picks.len() < target {
        let mut best: Option<(usize, f32)> = None;

        for j in (0..n).filter(|&j| !selected[j]) {
            let score = if picks.is_empty() {
                similarities[j]
            } else {
                lambda * similarities[j] - (1.0 - lambda) * redundancy[j]
            };
            // strict comparison keeps the lowest index on ties
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((j, score));
            }
        }

        let Some((chosen, score)) = best else {
            break;
        };
        selected[chosen] = true;
        picks.push(MmrSelection {
            index: chosen,
            similarity: similarities[chosen],
            score,
        });

        let chosen_vector = candidates[chosen].as_ref();
        for j in (0..n).filter(|&j| !selected[j]) {
            let sim = dot(candidates[j].as_ref(), chosen_vector);
            if sim > redundancy[j] {
                redundancy[j] = sim;
            }
        }
    }

    picks
}

/// Indices only, in selection order
pub fn mmr_indices<V: AsRef<[f32]>>(query: &[f32], candidates: &[V], k: usize, lambda: f32) -> Vec<usize> {
    mmr_select(query, candidates, k, lambda)
        .into_iter()
        .map(|s| s.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Tabasco (200 evacuated), Oaxaca, Tabasco (210 evacuated)
    fn tabasco_oaxaca() -> (Vec<f32>, Vec<Vec<f32>>) {
        (
            vec![1.0, 0.0, 0.0],
            vec![
                vec![0.8, 0.6, 0.0],
                vec![0.6, 0.0, 0.8],
                vec![0.78, 0.62, 0.0],
            ],
        )
    }

    #[test]
    fn test_balanced_lambda_prefers_diverse_pair() {
        let (query, docs) = tabasco_oaxaca();
        // round 2: Oaxaca 0.5*0.6 - 0.5*0.48 = 0.06, Tabasco dup 0.5*0.78 - 0.5*0.996 = -0.108
        let picks = mmr_select(&query, &docs, 2, 0.5);
        assert_eq!(picks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1]);
        assert!((picks[1].score - 0.06).abs() < 1e-5);
        assert!((picks[0].similarity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_lambda_one_is_plain_top_k() {
        let (query, docs) = tabasco_oaxaca();
        assert_eq!(mmr_indices(&query, &docs, 2, 1.0), vec![0, 2]);
        assert_eq!(mmr_indices(&query, &docs, 3, 1.0), vec![0, 2, 1]);
    }

    #[test]
    fn test_lambda_zero_skips_duplicates() {
        let query = [1.0, 0.0];
        let docs = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.6, 0.8]];
        assert_eq!(mmr_indices(&query, &docs, 2, 0.0), vec![0, 2]);
    }

    #[test]
    fn test_redundancy_is_max_not_mean() {
        let query = [0.5, 0.3, 0.4, 0.0];
        let docs = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            // close to the first pick only: max 0.9, mean 0.45
            vec![0.9, 0.0, 0.025, 0.0],
            // moderately close to both: max 0.6, mean 0.6
            vec![0.6, 0.6, -0.05, 0.0],
        ];
        // averaging would pick index 2 in the third round
        assert_eq!(mmr_indices(&query, &docs, 3, 0.5), vec![0, 1, 3]);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let query = [1.0, 0.0];
        let docs = vec![vec![1.0, 0.0], vec![0.5, 0.5], vec![0.5, -0.5]];
        let picks = mmr_select(&query, &docs, 3, 0.5);
        assert_eq!(picks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(picks[1].score, picks[2].score);

        let same = vec![vec![0.3, 0.3]; 4];
        assert_eq!(mmr_indices(&query, &same, 2, 0.5), vec![0, 1]);
    }

    #[test]
    fn test_fewer_candidates_than_k() {
        let (query, docs) = tabasco_oaxaca();
        assert_eq!(mmr_select(&query, &docs, 5, 0.5).len(), 3);
        assert!(mmr_select(&query, &docs, 0, 0.5).is_empty());
        assert!(mmr_select::<Vec<f32>>(&query, &[], 3, 0.5).is_empty());
    }

    #[test]
    fn test_out_of_range_lambda_clamped() {
        let (query, docs) = tabasco_oaxaca();
        assert_eq!(
            mmr_indices(&query, &docs, 3, 7.0),
            mmr_indices(&query, &docs, 3, 1.0)
        );
        assert_eq!(
            mmr_indices(&query, &docs, 3, -2.0),
            mmr_indices(&query, &docs, 3, 0.0)
        );
        assert_eq!(
            mmr_indices(&query, &docs, 3, f32::NAN),
            mmr_indices(&query, &docs, 3, DEFAULT_LAMBDA)
        );
    }

    fn arb_vectors() -> impl Strategy<Value = Vec<Vec<f32>>> {
        proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0, 4), 1..16)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn selection_is_deterministic(
            docs in arb_vectors(),
            query in proptest::collection::vec(-1.0f32..1.0, 4),
            k in 0usize..20,
            lambda in 0.0f32..=1.0,
        ) {
            let first = mmr_select(&query, &docs, k, lambda);
            let second = mmr_select(&query, &docs, k, lambda);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), k.min(docs.len()));

            let mut seen = first.iter().map(|p| p.index).collect::<Vec<_>>();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), first.len());
        }

        #[test]
        fn lambda_one_matches_sorted_similarity(
            docs in arb_vectors(),
            query in proptest::collection::vec(-1.0f32..1.0, 4),
            k in 1usize..20,
        ) {
            let mut expected: Vec<usize> = (0..docs.len()).collect();
            // stable sort keeps lower indices first on equal similarity
            expected.sort_by(|&a, &b| {
                dot(&docs[b], &query)
                    .partial_cmp(&dot(&docs[a], &query))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            expected.truncate(k);

            prop_assert_eq!(mmr_indices(&query, &docs, k, 1.0), expected);
        }
    }
}
