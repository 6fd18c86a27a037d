//! Impossible-travel, new-country, and high-risk-country checks (§4.4).

use super::{AnalysisContext, Analyzer};
use crate::config::GeographicConfig;
use crate::domain::{Method, RiskFactor};
use async_trait::async_trait;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub struct GeographicAnalyzer {
    config: GeographicConfig,
    weight: f64,
}

impl GeographicAnalyzer {
    pub fn new(config: GeographicConfig, weight: f64) -> Self {
        Self { config, weight }
    }
}

#[async_trait]
impl Analyzer for GeographicAnalyzer {
    fn method(&self) -> Method {
        Method::Geographic
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let mut raw = 0.0f64;
        let mut fired = Vec::new();

        let current_country = ctx
            .current_country
            .clone()
            .or_else(|| ctx.event.payload.geographic.as_ref().and_then(|g| g.country.clone()));

        let last_tx = ctx.history.transactions.last();

        if let (Some(country), Some(last)) = (&current_country, last_tx) {
            if let Some(last_country) = &last.country {
                let hours_since = (ctx.now - last.timestamp).num_seconds() as f64 / 3600.0;
                let mut impossible = last_country != country && hours_since < self.config.impossible_travel_hours;

                if let Some(geo) = ctx.event.payload.geographic.as_ref() {
                    if let (Some(lat), Some(lon)) = (geo.latitude, geo.longitude) {
                        if let Some(last_coords) = last_transaction_coords(last) {
                            let distance = haversine_km(lat, lon, last_coords.0, last_coords.1);
                            if hours_since > 0.0 {
                                let speed = distance / hours_since;
                                if speed > self.config.max_reasonable_speed_kmh {
                                    impossible = true;
                                }
                            }
                        }
                    }
                }

                if impossible {
                    raw += 0.35;
                    fired.push("impossible_travel");
                }
            }
        }

        if let Some(country) = &current_country {
            if !ctx.known_countries.is_empty() && !ctx.known_countries.contains(country) {
                raw += 0.15;
                fired.push("new_country");
            }

            if let Some(risk) = self.config.high_risk_countries.get(country) {
                raw += *risk;
                fired.push("high_risk_country");
            }
        }

        raw = raw.min(self.config.rawscore_cap);
        let mut details = HashMap::new();
        details.insert("rules_fired".to_string(), serde_json::json!(fired));
        details.insert("current_country".to_string(), serde_json::json!(current_country));

        RiskFactor::new(Method::Geographic, raw, self.weight, geo_reason(raw))
            .with_detail("component", details)
    }
}

fn last_transaction_coords(last: &crate::domain::HistoricalTransaction) -> Option<(f64, f64)> {
    Some((last.latitude?, last.longitude?))
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

fn geo_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "Geography consistent with known patterns".to_string()
    } else {
        format!("Geographic risk detected (raw score {:.2})", raw)
    }
}
