use core::pin::pin;

use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use log::{debug, error, info};

use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionState, Connector, Link};
use crate::constants::STATS_REPORT_EVERY;
use crate::publisher::Publisher;
use crate::sampler::Sampler;
use crate::scheduler::{Scheduler, Tick};
use crate::sensors::SensorReadout;
use crate::stats::NodeStats;

/// The sampling side of the loop: everything a cycle touches except the connection.
struct Cycle<R> {
    sampler: Sampler<R>,
    scheduler: Scheduler,
    publisher: Publisher,
    stats: NodeStats,
}

impl<R: SensorReadout> Cycle<R> {
    /// Samples every channel and attempts one publish. Returns whether the payload reached the
    /// broker. Without a session the sample is still taken and reported as not connected.
    async fn run<L: Link>(
        &mut self,
        tick: Tick,
        session: Option<(&mut ConnectionManager, &mut L)>,
    ) -> bool {
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        let timestamp_ms = Instant::now().as_millis();
        let sample = self.sampler.sample(timestamp_ms).await;
        self.scheduler.finish_sampling(Instant::now());

        let published = match sample {
            Ok(sample) => {
                self.stats.record_sample(&sample);
                let result = self.publisher.publish(&sample, session).await;
                self.stats.record_publish(&result);
                result.is_ok()
            }
            Err(e) => {
                error!("Failed to assemble sample for tick {}: {}", tick.seq, e);
                self.stats.dropped = self.stats.dropped.wrapping_add(1);
                false
            }
        };

        self.stats.skipped = self.scheduler.skipped();
        if self.stats.ticks % STATS_REPORT_EVERY == 0 {
            info!("Telemetry stats: {}", self.stats);
        }
        published
    }
}

/// Single cooperative control loop: periodic sampling, publishing and the broker connection
/// all run from [`TelemetryNode::run`].
pub struct TelemetryNode<C, R> {
    connector: C,
    manager: ConnectionManager,
    cycle: Cycle<R>,
    ping_interval: Duration,
    close_timeout: Duration,
}

impl<C, R> TelemetryNode<C, R>
where
    C: Connector,
    R: SensorReadout,
{
    pub fn new(config: &Config, connector: C, readout: R) -> Self {
        let period = Duration::from_millis(config.telemetry_interval_ms);
        Self {
            connector,
            manager: ConnectionManager::new(config),
            cycle: Cycle {
                sampler: Sampler::new(readout, config),
                scheduler: Scheduler::new(Instant::now(), period),
                publisher: Publisher::new(config),
                stats: NodeStats::default(),
            },
            // PINGREQ once half the keep-alive has passed without traffic
            ping_interval: Duration::from_millis(u64::from(config.mqtt_keep_alive_secs) * 500),
            close_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }

    pub fn stats(&self) -> NodeStats {
        self.cycle.stats
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Runs forever. Sampling never waits on the broker: while the link is down each tick is
    /// still sampled and its publish reported as not connected.
    pub async fn run(&mut self) {
        info!(
            "Publishing telemetry to {} every {} ms",
            self.cycle.publisher.topic(),
            self.cycle.scheduler.period().as_millis()
        );

        loop {
            match self.manager.poll(Instant::now()) {
                ConnectionState::Connecting => self.connect_and_serve().await,
                _ => self.wait_offline().await,
            }
        }
    }

    async fn connect_and_serve(&mut self) {
        let Self {
            connector,
            manager,
            cycle,
            ping_interval,
            close_timeout,
        } = self;

        cycle.stats.connect_attempts = cycle.stats.connect_attempts.wrapping_add(1);
        let result = {
            // Ticks falling due during the attempt are sampled in between polls of the connect
            let mut connect = pin!(manager.connect(connector));
            loop {
                let next_tick = Timer::at(cycle.scheduler.next_deadline());
                match select(connect.as_mut(), next_tick).await {
                    Either::First(result) => break result,
                    Either::Second(()) => {
                        if let Some(tick) = cycle.scheduler.poll(Instant::now()) {
                            debug!("Tick {} while connecting", tick.seq);
                            let offline = None::<(&mut ConnectionManager, &mut C::Link<'_>)>;
                            cycle.run(tick, offline).await;
                        }
                    }
                }
            }
        };
        let mut link = match result {
            Ok(link) => link,
            Err(_) => return,
        };

        serve(&mut link, manager, cycle, *ping_interval).await;

        cycle.stats.link_losses = cycle.stats.link_losses.wrapping_add(1);
        // The link is dropped right after, releasing the socket for the next attempt
        let _ = with_timeout(*close_timeout, link.close()).await;
    }

    /// One step while there is no link: a due tick is sampled, otherwise sleep until the next
    /// tick or the end of the backoff, whichever comes first.
    async fn wait_offline(&mut self) {
        if let Some(tick) = self.cycle.scheduler.poll(Instant::now()) {
            let offline = None::<(&mut ConnectionManager, &mut C::Link<'_>)>;
            self.cycle.run(tick, offline).await;
            return;
        }

        let next_tick = self.cycle.scheduler.next_deadline();
        let wake_at = match self.manager.retry_at() {
            Some(retry_at) => retry_at.min(next_tick),
            None => next_tick,
        };
        Timer::at(wake_at).await;
    }
}

/// Services an open link until the manager reports it lost.
async fn serve<L: Link, R: SensorReadout>(
    link: &mut L,
    manager: &mut ConnectionManager,
    cycle: &mut Cycle<R>,
    ping_interval: Duration,
) {
    let mut last_sent = Instant::now();

    while manager.is_connected() {
        let now = Instant::now();
        if let Some(tick) = cycle.scheduler.poll(now) {
            if cycle.run(tick, Some((&mut *manager, &mut *link))).await {
                last_sent = Instant::now();
            }
            continue;
        }

        let ping_at = last_sent + ping_interval;
        if now >= ping_at {
            if manager.ping(link).await.is_ok() {
                last_sent = Instant::now();
            }
            continue;
        }

        Timer::at(cycle.scheduler.next_deadline().min(ping_at)).await;
    }
}
