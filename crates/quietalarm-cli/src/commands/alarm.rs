use chrono::{Local, NaiveDateTime, TimeZone};
use clap::Subcommand;
use quietalarm_core::{AlarmCategory, AlarmEvent, AlarmPayload};

use super::host::Host;

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Schedule an alarm and host it until it resolves
    Run {
        /// Alarm id
        #[arg(long, default_value = "1")]
        id: i32,
        /// Fire this many seconds from now
        #[arg(long, conflicts_with = "at")]
        in_secs: Option<u64>,
        /// Fire at a local time, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        at: Option<String>,
        /// Notification title
        #[arg(long, default_value = "Alarm")]
        title: String,
        /// Notification body
        #[arg(long, default_value = "")]
        body: String,
        /// Alarm category (standard or safety-critical)
        #[arg(long, default_value = "standard")]
        category: String,
    },
}

fn fire_at_millis(in_secs: Option<u64>, at: Option<&str>) -> Result<i64, Box<dyn std::error::Error>> {
    match (in_secs, at) {
        (_, Some(raw)) => {
            let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")?;
            let local = Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| format!("'{raw}' does not exist in the local time zone"))?;
            Ok(local.timestamp_millis())
        }
        (secs, None) => {
            let secs = secs.unwrap_or(0);
            i64::try_from(secs)
                .ok()
                .and_then(|secs| secs.checked_mul(1000))
                .and_then(|ms| Local::now().timestamp_millis().checked_add(ms))
                .ok_or_else(|| format!("--in-secs {secs} is too far in the future").into())
        }
    }
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AlarmAction::Run {
            id,
            in_secs,
            at,
            title,
            body,
            category,
        } => {
            let fire_at = fire_at_millis(in_secs, at.as_deref())?;
            let category: AlarmCategory = category.parse()?;

            let payload = AlarmPayload::new(id, fire_at, title, body, category);
            let rt = tokio::runtime::Runtime::new()?;
            let result = rt.block_on(host_alarm(payload));
            // A pending stdin read holds a blocking thread.
            rt.shutdown_background();
            result
        }
    }
}

async fn host_alarm(payload: AlarmPayload) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open(tokio::runtime::Handle::current())?;
    let entry = host.controller.scheduler().schedule(payload);
    println!("{}", serde_json::to_string(&AlarmEvent::scheduled(&entry))?);
    host.serve().await
}
