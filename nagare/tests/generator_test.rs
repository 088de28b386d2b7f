use nagare::{
    TokenId,
    generator::{GeneratorError, argmax::simple_argmax},
};

mod common;

use common::*;

fn greedy_chain(
    prompt: &[TokenId],
    steps: usize,
) -> Vec<TokenId> {
    let mut session = build_session(looping_model(), None);
    let mut logits = session.prefill(prompt).unwrap().logits;
    let mut tokens = Vec::new();
    for _ in 0..steps {
        let token_id = simple_argmax(&logits) as TokenId;
        tokens.push(token_id);
        logits = session.decode_step(token_id).unwrap().logits;
    }
    tokens
}

#[test]
fn test_greedy_decoding_is_deterministic() {
    let first = greedy_chain(&[HELLO], 6);
    let second = greedy_chain(&[HELLO], 6);
    assert_eq!(first, second);
    assert_eq!(first, vec![WORLD, BANG, AGAIN, BANG, AGAIN, BANG]);
}

#[test]
fn test_state_grows_by_one_per_step() {
    let mut session = build_session(stopping_model(), None);
    session.prefill(&[HELLO, WORLD]).unwrap();
    assert_eq!(session.sequence_length(), 2);

    for expected in 3..6 {
        session.decode_step(BANG).unwrap();
        let state = session.state();
        assert_eq!(state.sequence_length, expected);
        assert_eq!(state.attention_mask, vec![1; expected]);
        assert_eq!(
            state.position_ids,
            (0..expected as i64).collect::<Vec<_>>()
        );
        assert_eq!(state.kv_cache.length(), expected);
        assert_eq!(session.tokens().len(), expected);
    }
}

#[test]
fn test_decode_step_sees_the_fed_back_cache() {
    let config = stopping_model().repeat_bonus(1.0);
    let mut session = build_session(config, None);
    session.prefill(&[HELLO]).unwrap();
    let logits = session.decode_step(WORLD).unwrap().logits;

    assert_eq!(logits.len(), VOCAB_SIZE);
    assert_eq!(logits[HELLO as usize], 1.0);
    assert_eq!(logits[BANG as usize], 5.0);
    assert_eq!(logits[AGAIN as usize], 0.0);
}

#[test]
fn test_decode_before_prefill_fails() {
    let mut session = build_session(stopping_model(), None);
    assert!(matches!(
        session.decode_step(HELLO),
        Err(GeneratorError::NotPrefilled)
    ));
}

#[test]
fn test_context_limit_leaves_session_untouched() {
    let mut session = build_session(looping_model(), Some(3));
    session.prefill(&[HELLO, WORLD]).unwrap();
    session.decode_step(BANG).unwrap();

    let error = session.decode_step(AGAIN).unwrap_err();
    assert!(matches!(
        error,
        GeneratorError::ContextLengthExceeded {
            limit: 3
        }
    ));
    assert_eq!(session.sequence_length(), 3);
    assert_eq!(session.tokens(), &[HELLO, WORLD, BANG]);
}
