//! A fake group member: connects to a Waymark server, wanders around a
//! starting point, and logs what the rest of the group reports.
//!
//! ```text
//! simulate-member 'ws://127.0.0.1:8080/?group_id=family&token=...'
//! ```
//!
//! The URL can also come from `WAYMARK_URL`. `WAYMARK_START` sets the
//! starting point as `lat,lng`, and `WAYMARK_PERIOD_SECS` the time
//! between fixes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_START: (f64, f64) = (-23.5505, -46.6333);
const DEFAULT_PERIOD: Duration = Duration::from_secs(2);
/// Largest step per fix, in meters.
const MAX_STEP_M: f64 = 25.0;
const METERS_PER_DEGREE: f64 = 111_195.0;

#[derive(Serialize)]
struct OutboundFix {
    latitude: f64,
    longitude: f64,
    timestamp: f64,
    accuracy: f64,
}

/// A random walk around a starting point.
struct Walk {
    latitude: f64,
    longitude: f64,
}

impl Walk {
    fn step(&mut self) -> OutboundFix {
        let mut rng = rand::rng();
        let heading = rng.random_range(0.0..std::f64::consts::TAU);
        let meters = rng.random_range(0.0..MAX_STEP_M);

        self.latitude = (self.latitude + meters * heading.cos() / METERS_PER_DEGREE)
            .clamp(-90.0, 90.0);
        let lng_scale = self.latitude.to_radians().cos().max(0.01);
        self.longitude += meters * heading.sin() / (METERS_PER_DEGREE * lng_scale);
        if self.longitude > 180.0 {
            self.longitude -= 360.0;
        } else if self.longitude < -180.0 {
            self.longitude += 360.0;
        }

        OutboundFix {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: unix_now(),
            accuracy: rng.random_range(3.0..15.0),
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

fn start_point() -> Result<(f64, f64), Box<dyn std::error::Error>> {
    let Ok(raw) = std::env::var("WAYMARK_START") else {
        return Ok(DEFAULT_START);
    };
    let (lat, lng) = raw
        .split_once(',')
        .ok_or("WAYMARK_START must look like `lat,lng`")?;
    Ok((lat.trim().parse()?, lng.trim().parse()?))
}

fn period() -> Result<Duration, Box<dyn std::error::Error>> {
    match std::env::var("WAYMARK_PERIOD_SECS") {
        Ok(raw) => Ok(Duration::from_secs_f64(raw.parse()?)),
        Err(_) => Ok(DEFAULT_PERIOD),
    }
}

/// Logs one server message.
fn report(text: &str) {
    let Ok(msg) = serde_json::from_str::<Value>(text) else {
        warn!(%text, "unreadable server message");
        return;
    };
    match msg["type"].as_str() {
        Some("session_ready") => info!(user_id = %msg["user_id"], group_id = %msg["group_id"], "joined"),
        Some("location_update") => info!(
            who = %msg["user_name"],
            lat = %msg["latitude"],
            lng = %msg["longitude"],
            "location update"
        ),
        Some("notice") => warn!(code = %msg["code"], message = %msg["message"], "server notice"),
        _ => info!(%text, "server message"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WAYMARK_URL").ok())
        .ok_or("usage: simulate-member <ws-url> (or set WAYMARK_URL)")?;
    let (latitude, longitude) = start_point()?;
    let mut ticker = tokio::time::interval(period()?);

    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();
    let mut walk = Walk {
        latitude,
        longitude,
    };

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let body = serde_json::to_string(&walk.step())?;
                if let Err(e) = sink.send(Message::Text(body.into())).await {
                    warn!(error = %e, "send failed");
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => report(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(f) => info!(code = u16::from(f.code), reason = %f.reason, "server closed the session"),
                        None => info!("server closed the session"),
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "connection error");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
    Ok(())
}
