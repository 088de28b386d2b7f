use crate::TokenId;

/// How the target model's prediction affects the committed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPolicy {
    /// The draft's token is always committed. The target follows its own
    /// greedy chain in lockstep and is never consulted.
    Unverified,
    /// On disagreement the target's greedy token is committed instead, and
    /// both models are fed the committed token.
    Greedy,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy::Unverified
    }
}

#[derive(Debug, Clone)]
pub struct SpeculativeConfig {
    pub max_iterations: usize,
    pub eos_token_ids: Vec<TokenId>,
    pub policy: VerificationPolicy,
}

impl SpeculativeConfig {
    pub fn new(
        max_iterations: usize,
        eos_token_ids: Vec<TokenId>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            max_iterations,
            eos_token_ids,
            policy,
        }
    }

    pub fn max_iterations(
        mut self,
        max_iterations: usize,
    ) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn eos_token_ids(
        mut self,
        eos_token_ids: Vec<TokenId>,
    ) -> Self {
        self.eos_token_ids = eos_token_ids;
        self
    }

    pub fn policy(
        mut self,
        policy: VerificationPolicy,
    ) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self::new(50, vec![2], VerificationPolicy::default())
    }
}
