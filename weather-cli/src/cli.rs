use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossterm::{
    cursor, execute,
    terminal::{self, ClearType},
};
use cwa_weather_core::{
    Config, LocationRecord, Moment, SunSchedule, SunTimes, WeatherProvider, WeatherStore,
    available_locations, classify_or_day,
    config::{provider_from_config, sun_schedule_from_config},
    model::taiwan_offset,
    resolve,
};
use inquire::{Password, PasswordDisplayMode, Select};
use std::{
    future::Future,
    io::{self, Write},
    time::Duration,
};
use tokio::time::Interval;
use tracing::{debug, info};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cwa-weather", version, about = "Taiwan weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the CWA API key and choose the city to show.
    Configure,

    /// Fetch and show the weather card once.
    Show {
        /// City to show instead of the configured one, e.g. "高雄市".
        #[arg(long)]
        city: Option<String>,

        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Keep the card on screen and refresh it periodically.
    Watch {
        #[arg(long)]
        city: Option<String>,

        /// Seconds between refreshes.
        #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(10..))]
        interval: u64,
    },

    /// List supported cities.
    Locations,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, json } => show(city.as_deref(), json).await,
            Command::Watch { city, interval } => {
                watch(city.as_deref(), Duration::from_secs(interval)).await
            }
            Command::Locations => {
                print!("{}", render::locations(available_locations()));
                Ok(())
            }
        }
    }
}

/// Everything a fetch cycle needs, read from config once at startup.
struct Session {
    location: &'static LocationRecord,
    provider: Box<dyn WeatherProvider>,
    schedule: Box<dyn SunSchedule>,
    store: WeatherStore,
}

impl Session {
    fn init(city_override: Option<&str>) -> Result<Self> {
        let config = Config::load()?;
        let location = match city_override {
            Some(city) => resolve(city)?,
            None => config.location()?,
        };
        info!(city = location.city_name, station = location.location_name, "session initialised");

        Ok(Self {
            location,
            provider: Box::new(provider_from_config(&config)?),
            schedule: sun_schedule_from_config(&config)?,
            store: WeatherStore::new(),
        })
    }

    async fn refresh(&self) -> Result<()> {
        self.store
            .refresh(self.provider.as_ref(), self.location)
            .await
            .with_context(|| format!("Failed to fetch weather for {}", self.location.city_name))?;
        Ok(())
    }

    fn moment(&self) -> Moment {
        classify_or_day(self.schedule.as_ref(), self.location.sunrise_city_name, Utc::now())
    }

    fn sun_times_today(&self) -> Option<SunTimes> {
        let today = Utc::now().with_timezone(&taiwan_offset()).date_naive();
        self.schedule
            .sun_times(self.location.sunrise_city_name, today)
            .map_err(|err| debug!(error = %err, "no sun times for today"))
            .ok()
    }

    fn render(&self) -> String {
        render::card(
            self.location,
            &self.store.state(),
            self.moment(),
            self.sun_times_today(),
        )
    }
}

async fn show(city: Option<&str>, json: bool) -> Result<()> {
    let session = Session::init(city)?;
    session.refresh().await?;

    if json {
        let snapshot = session.store.snapshot();
        println!("{}", render::json(session.location, &snapshot, session.moment())?);
    } else {
        print!("{}", session.render());
    }
    Ok(())
}

async fn watch(city: Option<&str>, every: Duration) -> Result<()> {
    let session = &Session::init(city)?;

    run_until(tokio::time::interval(every), tokio::signal::ctrl_c(), move || async move {
        // Failures are recorded in the store and shown on the card.
        let _ = session.refresh().await;
        redraw(&session.render())
    })
    .await
}

/// Run `tick` on every tick of `ticker` until `shutdown` resolves.
///
/// `shutdown` is also raced against a tick that is still running, so an
/// in-flight refresh never delays exit.
async fn run_until<S, F, Fut>(mut ticker: Interval, shutdown: S, mut tick: F) -> Result<()>
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            res = tick() => res?,
        }
    }
}

fn redraw(card: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    stdout.write_all(card.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let key = Password::new("CWA API key (leave empty to keep the current one):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("API key prompt aborted")?;
    if !key.trim().is_empty() {
        config.api_key = Some(key.trim().to_string());
    }

    let cities: Vec<&str> = available_locations().iter().map(|loc| loc.city_name).collect();
    let current = config.city_name_or_default().to_string();
    let cursor = cities.iter().position(|c| *c == current).unwrap_or(0);

    let city = Select::new("City:", cities)
        .with_starting_cursor(cursor)
        .prompt()
        .context("City selection aborted")?;
    config.set_city(city)?;

    config.save()?;
    println!("Saved {} to {}", city, Config::config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[test]
    fn parses_show_with_city_and_json() {
        let cli =
            Cli::try_parse_from(["cwa-weather", "show", "--city", "高雄市", "--json"]).unwrap();
        match cli.command {
            Command::Show { city, json } => {
                assert_eq!(city.as_deref(), Some("高雄市"));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_interval_defaults_and_has_a_floor() {
        let cli = Cli::try_parse_from(["cwa-weather", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval: 300, city: None }));

        assert!(Cli::try_parse_from(["cwa-weather", "watch", "--interval", "1"]).is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["cwa-weather"]).is_err());
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_pending_tick() {
        let calls = AtomicUsize::new(0);
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));

        let ticker = tokio::time::interval(Duration::from_millis(5));
        let run = run_until(ticker, rx, || {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            // A refresh that never completes.
            std::future::pending::<Result<()>>()
        });

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ticks_repeat_until_shutdown() {
        let calls = AtomicUsize::new(0);
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));

        let ticker = tokio::time::interval(Duration::from_millis(1));
        let run = run_until(ticker, rx, || {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                tx.lock().unwrap().take().unwrap().send(()).unwrap();
            }
            std::future::ready(Ok(()))
        });

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn tick_error_ends_the_loop() {
        let ticker = tokio::time::interval(Duration::from_millis(1));
        let err = run_until(ticker, std::future::pending::<()>(), || {
            std::future::ready(Err::<(), _>(anyhow::anyhow!("terminal gone")))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "terminal gone");
    }
}
