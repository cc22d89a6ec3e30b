use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::register_toolbelt;

pub const WTTR_BASE: &str = "https://wttr.in";

pub struct Weather {
    client: reqwest::Client,
    base_url: String,
}

impl Weather {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("errand/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: WTTR_BASE.to_string(),
        }
    }
}

register_toolbelt! {
    Weather {
        name: "Weather",
        description: "Current weather conditions from wttr.in",
        tools: {
            "get_weather" => get_weather {
                description: "Get the current weather for a city. Returns a one-sentence description with the temperature in Celsius.",
                params: ["city": "string" => "Name of the city, e.g. 'Lagos'"]
            }
        }
    }
}

impl Weather {
    async fn get_weather(&self, args: &Value) -> Result<String> {
        let city = args["city"].as_str().unwrap_or("").trim();
        if city.is_empty() {
            return Ok("Error: city cannot be empty".to_string());
        }

        Ok(match self.fetch(city).await {
            Ok(Some(report)) => report,
            Ok(None) => format!("Could not get weather for {}", city),
            Err(e) => format!("Weather error: {}", e),
        })
    }

    async fn fetch(&self, city: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(city));

        let response = self
            .client
            .get(&url)
            .query(&[("format", "j1")])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(city, status = %response.status(), "weather lookup failed");
            return Ok(None);
        }

        let data: Value = response.json().await?;
        Ok(describe_conditions(city, &data))
    }
}

/// Sentence for the `current_condition` block of a wttr.in `j1` payload.
pub fn describe_conditions(city: &str, data: &Value) -> Option<String> {
    let current = data["current_condition"].get(0)?;
    let temp = match &current["temp_C"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let desc = current["weatherDesc"].get(0)?["value"].as_str()?.trim();

    Some(format!(
        "The weather in {} is a {} with a temperature of {}°C.",
        city,
        desc.to_lowercase(),
        temp
    ))
}
