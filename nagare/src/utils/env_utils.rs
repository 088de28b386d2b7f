#[derive(Copy, Clone, Debug)]
pub enum EnvVar {
    Log,
    SkipModelValidation,
}

impl EnvVar {
    pub fn key(&self) -> &'static str {
        match self {
            EnvVar::Log => "NAGARE_LOG",
            EnvVar::SkipModelValidation => "NAGARE_SKIP_MODEL_VALIDATION",
        }
    }

    pub fn value(&self) -> String {
        std::env::var(self.key()).unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        let upper = self.value().to_ascii_uppercase();
        matches!(upper.as_str(), "1" | "YES" | "TRUE")
    }
}
