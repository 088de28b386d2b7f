use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunStats {
    pub count: u64,
    pub average_duration: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StepStats {
    pub duration: f64,
    pub tokens_count: u64,
    pub tokens_per_second: f64,
    pub model_run: RunStats,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TotalStats {
    pub duration: f64,
    pub tokens_count_input: u64,
    pub tokens_count_output: u64,
}

/// Timings of one generation, in seconds.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Stats {
    pub prefill_stats: StepStats,
    pub generate_stats: Option<StepStats>,
    pub total_stats: TotalStats,
}

impl Stats {
    pub fn tokens_per_second(&self) -> f64 {
        match &self.generate_stats {
            Some(generate_stats) => generate_stats.tokens_per_second,
            None => self.prefill_stats.tokens_per_second,
        }
    }
}

/// Counters kept by the controller across calls, durations in milliseconds.
///
/// Load and unload durations persist until [`reset`](Self::reset); the
/// per-generation fields are overwritten by every completed generation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PerformanceStatistics {
    pub llm_load_duration: f64,
    pub llm_unload_duration: f64,
    pub llm_cancel_duration: f64,
    pub tokenizer_load_duration: f64,
    pub tokenizer_unload_duration: f64,
    pub llm_first_infer_duration: f64,
    pub llm_prompt_evaluation_speed: f64,
    pub llm_generate_next_token_duration: f64,
    pub llm_average_token_per_second: f64,
    pub input_token_num: u64,
    pub generated_token_num: u64,
}

impl PerformanceStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record_generation(
        &mut self,
        stats: &Stats,
    ) {
        self.input_token_num = stats.total_stats.tokens_count_input;
        self.generated_token_num = stats.total_stats.tokens_count_output;
        self.llm_first_infer_duration = stats.prefill_stats.duration * 1000.0;
        self.llm_prompt_evaluation_speed = stats.prefill_stats.tokens_per_second;
        match &stats.generate_stats {
            Some(generate_stats) => {
                self.llm_generate_next_token_duration =
                    generate_stats.model_run.average_duration * 1000.0;
                self.llm_average_token_per_second =
                    generate_stats.tokens_per_second;
            },
            None => {
                self.llm_generate_next_token_duration = 0.0;
                self.llm_average_token_per_second = 0.0;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_timings_are_reported_in_milliseconds() {
        let stats = Stats {
            prefill_stats: StepStats {
                duration: 0.25,
                tokens_count: 4,
                tokens_per_second: 16.0,
                model_run: RunStats {
                    count: 1,
                    average_duration: 0.25,
                },
            },
            generate_stats: Some(StepStats {
                duration: 1.0,
                tokens_count: 10,
                tokens_per_second: 10.0,
                model_run: RunStats {
                    count: 10,
                    average_duration: 0.1,
                },
            }),
            total_stats: TotalStats {
                duration: 1.25,
                tokens_count_input: 4,
                tokens_count_output: 11,
            },
        };

        let mut statistics = PerformanceStatistics {
            llm_load_duration: 12.0,
            ..Default::default()
        };
        statistics.record_generation(&stats);

        assert!(is_close!(statistics.llm_first_infer_duration, 250.0));
        assert!(is_close!(statistics.llm_generate_next_token_duration, 100.0));
        assert_eq!(statistics.generated_token_num, 11);
        assert!(is_close!(statistics.llm_load_duration, 12.0));

        statistics.reset();
        assert_eq!(statistics, PerformanceStatistics::default());
    }
}
