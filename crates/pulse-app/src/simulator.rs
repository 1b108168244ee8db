//! Simulated market.
//!
//! Serves randomized instrument lists per category and a tick stream that
//! moves a few random instruments every one to two seconds. Used in
//! `simulated` mode in place of the REST source and the WebSocket feed.

use crate::config::SimulatorConfig;
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;
use pulse_core::{now_ms, Category, Instrument, InstrumentId, Phase, Price, Tick};
use pulse_source::{InstrumentSource, SourceResult};
use pulse_ws::{Session, Transport, TransportEvent, WsResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Last generated quote of one instrument.
#[derive(Debug, Clone, Copy)]
struct Quote {
    price: f64,
    updated_at: i64,
}

struct MarketState {
    rng: StdRng,
    quotes: HashMap<InstrumentId, Quote>,
}

/// In-process market implementing both `InstrumentSource` and `Transport`.
#[derive(Clone)]
pub struct SimulatedMarket {
    config: SimulatorConfig,
    state: Arc<Mutex<MarketState>>,
}

impl SimulatedMarket {
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic market for a given seed.
    pub fn seeded(config: SimulatorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulatorConfig, rng: StdRng) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MarketState {
                rng,
                quotes: HashMap::new(),
            })),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Generate the full instrument list of one category.
    pub fn generate(&self, category: Category) -> Vec<Instrument> {
        let now = now_ms();
        let config = &self.config;
        let mut state = self.state.lock();
        let mut instruments = Vec::with_capacity(config.instruments_per_category);

        for i in 0..config.instruments_per_category {
            let rng = &mut state.rng;
            let base = rng.gen_range(config.base_price_min..=config.base_price_max);
            let change = rng.gen_range(-0.1..=0.1);
            let volume = rng.gen_range(0.0..10_000_000.0);
            let supply = rng.gen_range(100_000.0..1_000_000.0);
            let liquidity = rng.gen_range(0.0..5_000_000.0);
            let phase = [Phase::P1, Phase::P2, Phase::P3][rng.gen_range(0..3)];
            let age = rng.gen_range(0..WEEK_MS);

            let id = InstrumentId::new(format!("{category}-{i}"));
            let updated_at = state
                .quotes
                .get(&id)
                .map_or(now, |quote| quote.updated_at.max(now));
            state.quotes.insert(
                id.clone(),
                Quote {
                    price: base,
                    updated_at,
                },
            );
            instruments.push(Instrument {
                id,
                symbol: format!("TOK{i}"),
                name: format!("Token {i}"),
                price: Price::new(decimal(base)),
                price_change_24h: decimal(base * change),
                price_change_percent_24h: decimal(change * 100.0),
                volume_24h: decimal(volume),
                market_cap: decimal(base * supply),
                liquidity: decimal(liquidity),
                phase: Some(phase),
                category,
                created_at: now - age,
                updated_at,
            });
        }

        debug!(%category, count = instruments.len(), "Generated instruments");
        instruments
    }

    /// Move 2-5 random instruments out of `ids` and return their ticks.
    ///
    /// Tick timestamps strictly increase per instrument, so every generated
    /// tick is newer than the record it moves.
    pub fn next_batch(&self, ids: &[InstrumentId]) -> Vec<Tick> {
        let config = &self.config;
        let now = now_ms();
        let mut state = self.state.lock();
        let state = &mut *state;

        let count = state
            .rng
            .gen_range(config.ticks_per_batch_min..=config.ticks_per_batch_max)
            .min(ids.len());
        let chosen: Vec<&InstrumentId> = ids.choose_multiple(&mut state.rng, count).collect();
        let max_move = config.max_move_pct / 100.0;

        let mut ticks = Vec::with_capacity(chosen.len());
        for id in chosen {
            let (last, timestamp) = match state.quotes.get(id) {
                Some(quote) => (quote.price, now.max(quote.updated_at + 1)),
                None => (
                    state
                        .rng
                        .gen_range(config.base_price_min..=config.base_price_max),
                    now,
                ),
            };
            let step = state.rng.gen_range(-max_move..=max_move);
            let next = (last * (1.0 + step)).max(config.price_floor);
            state.quotes.insert(
                id.clone(),
                Quote {
                    price: next,
                    updated_at: timestamp,
                },
            );

            match Tick::new(
                id.clone(),
                Price::new(decimal(next)),
                decimal(next - last),
                decimal(step * 100.0),
                timestamp,
            ) {
                Ok(tick) => ticks.push(tick),
                Err(e) => debug!(%id, error = %e, "Dropping generated tick"),
            }
        }
        ticks
    }

    fn tick_interval(&self) -> Duration {
        let config = &self.config;
        let ms = self
            .state
            .lock()
            .rng
            .gen_range(config.tick_interval_min_ms..=config.tick_interval_max_ms);
        Duration::from_millis(ms)
    }

    /// Produce tick batches until `closed` fires or the session is dropped.
    async fn produce(
        self,
        ids: Vec<InstrumentId>,
        tx: mpsc::UnboundedSender<WsResult<TransportEvent>>,
        mut closed: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut closed => break,
                _ = tokio::time::sleep(self.tick_interval()) => {}
            }

            let batch = self.next_batch(&ids);
            trace!(count = batch.len(), "Simulated tick batch");
            for tick in batch {
                if tx.send(Ok(TransportEvent::Tick(tick))).is_err() {
                    return;
                }
            }
        }
        debug!("Simulated session closed");
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(6)
}

impl InstrumentSource for SimulatedMarket {
    fn fetch(&self, category: Category) -> BoxFuture<'static, SourceResult<Vec<Instrument>>> {
        let market = self.clone();
        let delay = Duration::from_millis(self.config.fetch_delay_ms);
        async move {
            tokio::time::sleep(delay).await;
            Ok(market.generate(category))
        }
        .boxed()
    }
}

impl Transport for SimulatedMarket {
    fn connect(&self, ids: Vec<InstrumentId>) -> BoxFuture<'static, WsResult<Session>> {
        let market = self.clone();
        let delay = Duration::from_millis(self.config.connect_delay_ms);
        async move {
            tokio::time::sleep(delay).await;

            let (tx, rx) = mpsc::unbounded_channel();
            let (close_tx, close_rx) = oneshot::channel();
            tokio::spawn(market.produce(ids, tx, close_rx));

            let events = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed();
            Ok(Session::new(events).with_closer(close_tx))
        }
        .boxed()
    }
}
