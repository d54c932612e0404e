use std::time::Duration;

pub const FRAME_BUDGET_ENV: &str = "STAGEHAND_FRAME_BUDGET_MS";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Minimum wall time per frame; the loop sleeps off whatever is left.
    pub frame_budget: Duration,
    pub clear_color: wgpu::Color,
    pub show_inspector: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "stagehand".to_string(),
            width: 1280,
            height: 720,
            frame_budget: Duration::from_millis(12),
            clear_color: wgpu::Color {
                r: 0.02,
                g: 0.02,
                b: 0.03,
                a: 1.0,
            },
            show_inspector: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let budget = std::env::var(FRAME_BUDGET_ENV).ok();
        Self::default().with_frame_budget_override(budget.as_deref())
    }

    fn with_frame_budget_override(mut self, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self;
        };

        match value.trim().parse::<u64>() {
            Ok(millis) => self.frame_budget = Duration::from_millis(millis),
            Err(e) => log::warn!("Ignoring {FRAME_BUDGET_ENV}={value:?}: {e}"),
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_twelve_milliseconds() {
        assert_eq!(
            EngineConfig::default().frame_budget,
            Duration::from_millis(12)
        );
    }

    #[test]
    fn budget_override_is_parsed() {
        let config = EngineConfig::default().with_frame_budget_override(Some(" 16 "));
        assert_eq!(config.frame_budget, Duration::from_millis(16));
    }

    #[test]
    fn invalid_override_keeps_default() {
        let config = EngineConfig::default().with_frame_budget_override(Some("fast"));
        assert_eq!(config.frame_budget, Duration::from_millis(12));

        let config = EngineConfig::default().with_frame_budget_override(None);
        assert_eq!(config.frame_budget, Duration::from_millis(12));
    }
}
