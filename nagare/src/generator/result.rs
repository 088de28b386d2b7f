#[derive(Debug, Clone)]
pub struct PrefillResult {
    /// Scores for the token following the last prompt position.
    pub logits: Vec<f32>,
    pub forwardpass_duration: f64,
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub logits: Vec<f32>,
    pub forwardpass_duration: f64,
}
