use std::{cmp::Ordering, collections::HashSet};

use rand::{
    SeedableRng,
    distr::{Distribution, weighted::WeightedIndex},
    rngs::StdRng,
};

use super::argmax::simple_argmax;
use crate::{
    TokenId,
    session::{
        config::SamplingConfig,
        parameter::{ResolvableValue, SamplingSeed},
    },
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenIdScore {
    pub id: TokenId,
    pub score: f32,
}

impl TokenIdScore {
    /// Descending by score, ascending by id among equal scores.
    fn rank(
        a: &TokenIdScore,
        b: &TokenIdScore,
    ) -> Ordering {
        b.score.total_cmp(&a.score).then(a.id.cmp(&b.id))
    }
}

/// Picks the next token from a row of logits.
///
/// The random stream is seeded once at construction, so a fixed seed
/// gives the same sequence of draws across one generation.
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_seed(seed: SamplingSeed) -> Self {
        Self::new(seed.resolve())
    }

    pub fn select(
        &mut self,
        logits: &[f32],
        history: &[TokenId],
        config: &SamplingConfig,
    ) -> TokenId {
        debug_assert!(!logits.is_empty(), "logits must not be empty");
        if !config.do_sample {
            return simple_argmax(logits) as TokenId;
        }

        let mut scores = logits.to_vec();
        apply_repeat_penalty(
            &mut scores,
            history,
            config.repeat_penalty,
            config.repeat_last_n,
        );
        apply_temperature(&mut scores, config.temperature);

        let mut candidates: Vec<TokenIdScore> = scores
            .iter()
            .enumerate()
            .map(|(id, &score)| TokenIdScore {
                id: id as TokenId,
                // NaN never wins, as in `simple_argmax`.
                score: if score.is_nan() {
                    f32::NEG_INFINITY
                } else {
                    score
                },
            })
            .collect();
        apply_top_k(&mut candidates, config.top_k);
        apply_top_p(&mut candidates, config.top_p);
        let fallback = candidates
            .iter()
            .min_by(|a, b| TokenIdScore::rank(a, b))
            .map(|candidate| candidate.id)
            .unwrap_or_default();
        softmax(&mut candidates);

        self.draw(&candidates, fallback)
    }

    /// Draws from `candidates`, or returns `fallback` when their weights
    /// do not form a distribution.
    fn draw(
        &mut self,
        candidates: &[TokenIdScore],
        fallback: TokenId,
    ) -> TokenId {
        match WeightedIndex::new(candidates.iter().map(|candidate| candidate.score)) {
            Ok(distribution) => candidates[distribution.sample(&mut self.rng)].id,
            Err(err) => {
                tracing::warn!(error = %err, "degenerate distribution, using top candidate");
                fallback
            },
        }
    }
}

/// Penalizes every distinct token among the last `last_n` of `history`.
pub fn apply_repeat_penalty(
    scores: &mut [f32],
    history: &[TokenId],
    penalty: f32,
    last_n: usize,
) {
    if penalty == 1.0 {
        return;
    }
    let window = &history[history.len() - history.len().min(last_n)..];
    let distinct: HashSet<TokenId> = window.iter().copied().collect();
    for id in distinct {
        let Some(score) = usize::try_from(id).ok().and_then(|id| scores.get_mut(id))
        else {
            continue;
        };
        if *score > 0.0 {
            *score /= penalty;
        } else {
            *score *= penalty;
        }
    }
}

pub fn apply_temperature(
    scores: &mut [f32],
    temperature: f32,
) {
    if temperature <= 0.0 {
        return;
    }
    for score in scores.iter_mut() {
        *score /= temperature;
    }
}

/// Keeps the `top_k` best candidates, sorted best first.
pub fn apply_top_k(
    candidates: &mut Vec<TokenIdScore>,
    top_k: usize,
) {
    if top_k == 0 || top_k >= candidates.len() {
        return;
    }
    candidates.select_nth_unstable_by(top_k - 1, TokenIdScore::rank);
    candidates.truncate(top_k);
    candidates.sort_by(TokenIdScore::rank);
}

/// Keeps the smallest best-first prefix whose probability mass reaches
/// `top_p`, including the candidate that crosses it. Never empties the list.
pub fn apply_top_p(
    candidates: &mut Vec<TokenIdScore>,
    top_p: f32,
) {
    if !(top_p > 0.0 && top_p < 1.0) || candidates.is_empty() {
        return;
    }
    candidates.sort_by(TokenIdScore::rank);
    let max_score = candidates[0].score;
    let weights: Vec<f32> = candidates
        .iter()
        .map(|candidate| (candidate.score - max_score).exp())
        .collect();
    let total: f32 = weights.iter().sum();

    let mut cumulative = 0.0;
    let mut keep = candidates.len();
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight / total;
        if cumulative >= top_p {
            keep = index + 1;
            break;
        }
    }
    candidates.truncate(keep.max(1));
}

pub fn softmax(candidates: &mut [TokenIdScore]) {
    let max_score = candidates
        .iter()
        .map(|candidate| candidate.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let mut total = 0.0;
    for candidate in candidates.iter_mut() {
        candidate.score = (candidate.score - max_score).exp();
        total += candidate.score;
    }
    for candidate in candidates.iter_mut() {
        candidate.score /= total;
    }
}
