//! Simulated remote store
//!
//! Stands in for the hosted realtime database during development. It
//! publishes a threshold map once, then on every tick pushes a live
//! snapshot and the full (capped) history snapshot through the
//! [`FeedHub`], exactly as the real subscriptions would.
//!
//! History records deliberately mix the shapes seen in the field: some
//! carry a numeric `timestamp`, some only a `time` string, and an
//! occasional record has a `time` that cannot be parsed at all.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::feeds::{FeedHub, FeedUpdate};
use crate::models::{LiveReading, Parameter};

/// Every n-th record gets an unparsable `time` string
const GARBLED_EVERY: u64 = 50;

/// Threshold map seeded into the simulated store
pub fn default_thresholds() -> Value {
    json!({
        "temperature": { "safeMin": 24.0, "safeMax": 30.0, "warnMin": 20.0, "warnMax": 33.0 },
        "ph":          { "safeMin": 7.5,  "safeMax": 8.5,  "warnMin": 7.0,  "warnMax": 9.0 },
        "salinity":    { "safeMin": 15.0, "safeMax": 25.0, "warnMin": 10.0, "warnMax": 30.0 },
        "turbidity":   { "safeMin": 0.0,  "safeMax": 30.0, "warnMin": 0.0,  "warnMax": 50.0 },
        "do":          { "safeMin": 5.0,  "safeMax": 9.0,  "warnMin": 4.0,  "warnMax": 10.0 }
    })
}

/// Fake store that produces pond-like readings
pub struct SimulatedStore {
    interval_ms: u64,
    history_limit: usize,
    history: VecDeque<Value>,
    /// Baseline per parameter, in `Parameter::ALL` order
    baseline: [f64; 5],
    drift_factor: f64,
    tick: u64,
    rng: StdRng,
}

impl SimulatedStore {
    pub fn new(interval_ms: u64, history_limit: usize) -> Self {
        info!(interval_ms, history_limit, "Initializing simulated remote store");
        Self::with_rng(interval_ms, history_limit, StdRng::from_entropy())
    }

    fn with_rng(interval_ms: u64, history_limit: usize, rng: StdRng) -> Self {
        Self {
            interval_ms,
            history_limit: history_limit.max(1),
            history: VecDeque::new(),
            baseline: [27.0, 7.9, 20.0, 12.0, 6.8],
            drift_factor: 0.0,
            tick: 0,
            rng,
        }
    }

    /// Publish until the dispatcher goes away.
    pub async fn run(mut self, hub: FeedHub) -> AppResult<()> {
        info!("Starting simulated feed loop");

        hub.publish(FeedUpdate::Thresholds(default_thresholds())).await?;

        let noise = Noise::new()?;
        let mut tick_interval = interval(Duration::from_millis(self.interval_ms.max(1)));

        loop {
            tick_interval.tick().await;

            let now = Utc::now();
            let live = self.next_reading(&noise, now);
            self.push_record(&live, now);

            debug!(
                tick = self.tick,
                buffered = self.history.len(),
                temperature = ?live.temperature,
                ph = ?live.ph,
                "Simulated store tick"
            );

            hub.publish(FeedUpdate::Live(live)).await?;
            hub.publish(FeedUpdate::History(self.snapshot())).await?;
        }
    }

    fn next_reading(&mut self, noise: &Noise, now: DateTime<Utc>) -> LiveReading {
        self.tick += 1;
        self.drift_factor += 0.01;
        if self.drift_factor > std::f64::consts::PI * 2.0 {
            self.drift_factor = 0.0;
        }

        // Afternoon warming; oxygen falls as the water warms
        let warming = (self.drift_factor * 0.5).sin() * 3.0;
        let [temp, ph, salinity, turbidity, dissolved_oxygen] = self.baseline;
        let rng = &mut self.rng;

        let turbidity_spike = if rng.gen::<f64>() < 0.03 {
            rng.gen_range(20.0..60.0)
        } else {
            0.0
        };

        // A sensor occasionally drops out for a tick
        let dropped = if rng.gen::<f64>() < 0.05 {
            Some(Parameter::ALL[rng.gen_range(0..Parameter::ALL.len())])
        } else {
            None
        };
        let reported = |parameter: Parameter, value: f64| {
            (dropped != Some(parameter)).then_some(value)
        };

        LiveReading {
            timestamp: Some(now.timestamp_millis()),
            temperature: reported(
                Parameter::Temperature,
                round1((temp + warming + noise.temperature.sample(rng)).clamp(-5.0, 45.0)),
            ),
            ph: reported(
                Parameter::Ph,
                round2((ph + noise.ph.sample(rng)).clamp(0.0, 14.0)),
            ),
            salinity: reported(
                Parameter::Salinity,
                round1((salinity + noise.salinity.sample(rng)).clamp(0.0, 50.0)),
            ),
            turbidity: reported(
                Parameter::Turbidity,
                round1((turbidity + turbidity_spike + noise.turbidity.sample(rng)).clamp(0.0, 1000.0)),
            ),
            dissolved_oxygen: reported(
                Parameter::DissolvedOxygen,
                round1((dissolved_oxygen - warming * 0.3 + noise.dissolved_oxygen.sample(rng)).clamp(0.0, 20.0)),
            ),
        }
    }

    /// Append `reading` to the store in one of the record shapes.
    fn push_record(&mut self, reading: &LiveReading, now: DateTime<Utc>) {
        let mut record = Map::new();

        if self.tick % GARBLED_EVERY == 0 {
            record.insert("time".into(), json!("not-a-date"));
        } else if self.tick % 2 == 0 {
            record.insert("timestamp".into(), json!(now.timestamp_millis()));
        } else {
            record.insert(
                "time".into(),
                json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }

        for parameter in Parameter::ALL {
            if let Some(value) = reading.value(parameter) {
                record.insert(parameter.key().into(), json!(value));
            }
        }

        self.history.push_back(Value::Object(record));
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    fn snapshot(&self) -> Value {
        Value::Array(self.history.iter().cloned().collect())
    }
}

/// Per-parameter noise distributions
struct Noise {
    temperature: Normal<f64>,
    ph: Normal<f64>,
    salinity: Normal<f64>,
    turbidity: Normal<f64>,
    dissolved_oxygen: Normal<f64>,
}

impl Noise {
    fn new() -> AppResult<Self> {
        let normal = |std_dev: f64| {
            Normal::new(0.0, std_dev)
                .map_err(|e| AppError::InternalError(format!("Invalid noise distribution: {e}")))
        };
        Ok(Self {
            temperature: normal(0.4)?,
            ph: normal(0.08)?,
            salinity: normal(0.6)?,
            turbidity: normal(2.0)?,
            dissolved_oxygen: normal(0.3)?,
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::run_dispatcher;
    use crate::models::ThresholdMap;
    use crate::state::AppState;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tokio::time::timeout;

    fn store(limit: usize) -> SimulatedStore {
        SimulatedStore::with_rng(100, limit, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_default_thresholds_cover_all_parameters() {
        let map = ThresholdMap::from_raw(&default_thresholds()).unwrap();
        assert_eq!(map.len(), Parameter::ALL.len());
    }

    #[test]
    fn test_readings_within_ranges() {
        let mut sim = store(10);
        let noise = Noise::new().unwrap();

        for _ in 0..200 {
            let reading = sim.next_reading(&noise, Utc::now());
            if let Some(ph) = reading.ph {
                assert!((0.0..=14.0).contains(&ph));
            }
            if let Some(temperature) = reading.temperature {
                assert!((-5.0..=45.0).contains(&temperature));
            }
        }
    }

    #[test]
    fn test_record_shapes_and_cap() {
        let mut sim = store(60);
        let noise = Noise::new().unwrap();

        for _ in 0..GARBLED_EVERY {
            let now = Utc::now();
            let reading = sim.next_reading(&noise, now);
            sim.push_record(&reading, now);
        }

        let snapshot = sim.snapshot();
        let records = snapshot.as_array().unwrap();
        assert_eq!(records.len(), GARBLED_EVERY as usize);
        assert!(records[0].get("time").is_some());
        assert!(records[1].get("timestamp").is_some());
        assert_eq!(records.last().unwrap()["time"], json!("not-a-date"));

        let mut small = store(3);
        for _ in 0..5 {
            let now = Utc::now();
            let reading = small.next_reading(&noise, now);
            small.push_record(&reading, now);
        }
        assert_eq!(small.history.len(), 3);
    }

    #[tokio::test]
    async fn test_simulated_store_feeds_state() {
        let state = Arc::new(RwLock::new(AppState::default()));
        let (hub, rx) = FeedHub::channel(16);
        let dispatcher = tokio::spawn(run_dispatcher(rx, state.clone()));
        let producer = tokio::spawn(store(500).run(hub));

        timeout(Duration::from_millis(1_000), async {
            loop {
                {
                    let state = state.read().await;
                    if state.revisions().history > 0 && state.live().is_some() {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("Timeout waiting for simulated snapshots");

        let state = state.read().await;
        assert!(state.thresholds().is_some());
        assert!(!state.history().is_empty());

        producer.abort();
        dispatcher.abort();
    }
}
