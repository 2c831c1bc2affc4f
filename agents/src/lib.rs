use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use spoof_sentry_core::config::ExplainConfig;
use spoof_sentry_core::explain::{Explainer, FlaggedEvent};
use spoof_sentry_core::geo::implied_pressure;
use spoof_sentry_core::rule::{PERFECT_ACCURACY_M, PRESSURE_DEVIATION_HPA};
use std::time::Duration;
use tracing::{debug, warn};

const UNREALISTIC_SPEED_MPS: f64 = 100.0;
const POOR_ACCURACY_M: f64 = 1000.0;
const FLIGHT_ALTITUDE_M: f64 = 8000.0;

const GENERIC_EXPLANATION: &str =
    "This event shows an unusual combination of sensor readings consistent with spoofing.";

pub const DEFAULT_PROMPT: &str = r#"You are a fraud analyst reviewing mobile location data.
The following event was flagged as likely GPS spoofing with a score of {{spoof_score}}.
Rules that fired: {{#each fired_rules}}{{this}}{{#unless @last}}, {{/unless}}{{else}}none{{/each}}.

Event data:
{{event}}

In one or two sentences, explain to a non-technical reviewer why this event looks spoofed."#;

/// Deterministic explanations built only from the event's own evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

impl TemplateExplainer {
    pub fn describe(&self, flagged: &FlaggedEvent) -> String {
        let reasons = Self::reasons(flagged);
        if reasons.is_empty() {
            return GENERIC_EXPLANATION.to_string();
        }
        format!(
            "This event is likely spoofed because {}.",
            reasons.join(" and ")
        )
    }

    fn reasons(flagged: &FlaggedEvent) -> Vec<String> {
        let event = &flagged.record.event;
        let fired = |id: &str| flagged.fired_rules.iter().any(|r| r == id);
        let mut reasons = Vec::new();

        if event.mock_location_enabled {
            reasons.push("the device reported an enabled mock location provider".to_string());
        }
        if fired("impossible_speed") {
            reasons.push(
                "the distance from the previous position implies a speed faster than sound"
                    .to_string(),
            );
        }
        if event.speed > UNREALISTIC_SPEED_MPS {
            reasons.push(format!(
                "the reported speed of {:.0} m/s is unrealistic for a ground device",
                event.speed
            ));
        }
        if event.horizontal_accuracy == PERFECT_ACCURACY_M {
            reasons.push(
                "the location accuracy is exactly 1 meter, which real GPS receivers rarely report"
                    .to_string(),
            );
        } else if event.horizontal_accuracy > POOR_ACCURACY_M {
            reasons.push(format!(
                "the location accuracy of {:.0} meters is very low, suggesting obfuscation",
                event.horizontal_accuracy
            ));
        }
        if fired("frozen_location") {
            reasons.push(format!(
                "the coordinates did not change while the device reported moving at {:.1} m/s",
                event.speed
            ));
        }
        if event.altitude > FLIGHT_ALTITUDE_M {
            reasons.push(format!(
                "the altitude of {:.0} meters is unusually high for a ground-based device",
                event.altitude
            ));
        }
        let deviation = (event.pressure_hpa - implied_pressure(event.altitude)).abs();
        if deviation > PRESSURE_DEVIATION_HPA {
            reasons.push(format!(
                "the barometric pressure of {:.1} hPa does not match an altitude of {:.0} meters",
                event.pressure_hpa, event.altitude
            ));
        }

        reasons
    }
}

#[async_trait]
impl Explainer for TemplateExplainer {
    fn name(&self) -> &str {
        "template"
    }

    async fn explain(&self, event: &FlaggedEvent) -> anyhow::Result<String> {
        Ok(self.describe(event))
    }
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    text: String,
}

/// Asks a text-generation endpoint for the explanation. Any failure falls
/// back to [`TemplateExplainer`], so explaining never fails a run.
pub struct RemoteExplainer {
    pub endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
    prompt: handlebars::Handlebars<'static>,
    fallback: TemplateExplainer,
}

impl RemoteExplainer {
    pub fn new(
        endpoint: String,
        model: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
        template: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut prompt = handlebars::Handlebars::new();
        prompt.set_strict_mode(true);
        prompt.register_escape_fn(handlebars::no_escape);
        prompt
            .register_template_string("prompt", template.as_deref().unwrap_or(DEFAULT_PROMPT))
            .context("Invalid prompt template")?;

        Ok(Self {
            endpoint,
            model,
            api_key,
            client,
            prompt,
            fallback: TemplateExplainer,
        })
    }

    /// Build from configuration. Returns `None` when no endpoint is set.
    pub fn from_config(config: &ExplainConfig) -> anyhow::Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };
        let api_key = match &config.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!(env = %var, "API key variable not set, calling endpoint without it");
                    None
                }
            },
            None => None,
        };
        Self::new(
            endpoint,
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_seconds),
            config.template.clone(),
        )
        .map(Some)
    }

    pub fn render_prompt(&self, event: &FlaggedEvent) -> anyhow::Result<String> {
        let context = serde_json::json!({
            "event_id": event.event_id,
            "spoof_score": event.spoof_score,
            "fired_rules": event.fired_rules,
            "event": serde_json::to_string_pretty(&event.record)?,
        });
        self.prompt
            .render("prompt", &context)
            .context("Failed to render prompt")
    }

    async fn generate(&self, prompt: String) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
        });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response: GenerationResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed generation response")?;
        Ok(response.text.trim().to_string())
    }
}

#[async_trait]
impl Explainer for RemoteExplainer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn explain(&self, event: &FlaggedEvent) -> anyhow::Result<String> {
        let prompt = self.render_prompt(event)?;
        debug!(endpoint = %self.endpoint, event_id = %event.event_id, "Requesting explanation");

        match self.generate(prompt).await {
            Ok(text) if !text.is_empty() => Ok(text),
            Ok(_) => {
                warn!(event_id = %event.event_id, "Empty explanation, using template");
                Ok(self.fallback.describe(event))
            }
            Err(e) => {
                warn!(error = %e, event_id = %event.event_id, "Explanation request failed, using template");
                Ok(self.fallback.describe(event))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoof_sentry_core::event::{EventRecord, LocationEvent};
    use uuid::Uuid;

    fn flagged(fired: &[&str]) -> FlaggedEvent {
        let record = EventRecord {
            event_id: Uuid::from_u128(11),
            installation_id: Uuid::from_u128(22),
            event: LocationEvent {
                timestamp_unix: 1_700_000_000,
                latitude: 40.7,
                longitude: -74.0,
                horizontal_accuracy: 10.0,
                vertical_accuracy: 15.0,
                altitude: 50.0,
                pressure_hpa: 1007.2,
                ambient_light_lux: 200.0,
                num_satellites: 12,
                device_is_charging: false,
                mock_location_enabled: false,
                speed: 1.4,
                bearing: 90.0,
                wifi_bssid: None,
                cell_tower_id: None,
            },
        };
        FlaggedEvent {
            event_id: record.event_id,
            spoof_score: 1.0,
            spoof_flag: true,
            record,
            fired_rules: fired.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_template_mock_and_teleport() {
        let mut e = flagged(&["mock_location", "impossible_speed"]);
        e.record.event.mock_location_enabled = true;
        e.record.event.speed = 1650.0;
        let text = TemplateExplainer.describe(&e);
        assert!(text.starts_with("This event is likely spoofed because the device reported"));
        assert!(text.contains("faster than sound"));
        assert!(text.contains("1650 m/s"));
        assert!(text.ends_with('.'));
    }

    #[test]
    fn test_template_perfect_accuracy_and_pressure() {
        let mut e = flagged(&["perfect_accuracy", "pressure_mismatch"]);
        e.record.event.horizontal_accuracy = 1.0;
        e.record.event.altitude = 400.0;
        let text = TemplateExplainer.describe(&e);
        assert!(text.contains("exactly 1 meter"));
        assert!(text.contains("1007.2 hPa"));
        assert!(text.contains(" and "));
    }

    #[test]
    fn test_template_generic_without_evidence() {
        assert_eq!(TemplateExplainer.describe(&flagged(&[])), GENERIC_EXPLANATION);
    }

    #[test]
    fn test_prompt_renders_event() {
        let explainer = RemoteExplainer::new(
            "http://127.0.0.1:9/generate".to_string(),
            None,
            None,
            Duration::from_secs(1),
            None,
        )
        .unwrap();
        let prompt = explainer
            .render_prompt(&flagged(&["frozen_location"]))
            .unwrap();
        assert!(prompt.contains("Rules that fired: frozen_location."));
        assert!(prompt.contains("\"latitude\": 40.7"));
        assert!(!prompt.contains("&quot;"));
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let result = RemoteExplainer::new(
            "http://localhost".to_string(),
            None,
            None,
            Duration::from_secs(1),
            Some("{{#each}}".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_no_endpoint_means_no_remote() {
        assert!(RemoteExplainer::from_config(&ExplainConfig::default())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back_to_template() {
        let explainer = RemoteExplainer::new(
            "http://127.0.0.1:9/generate".to_string(),
            Some("test".to_string()),
            None,
            Duration::from_secs(2),
            None,
        )
        .unwrap();
        let mut e = flagged(&["mock_location"]);
        e.record.event.mock_location_enabled = true;
        let text = explainer.explain(&e).await.unwrap();
        assert_eq!(text, TemplateExplainer.describe(&e));
    }
}
