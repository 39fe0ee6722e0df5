use quietalarm_core::MethodCall;
use serde_json::Value;

use super::host::Host;

pub fn run(method: String, args: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let args = match args {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Null,
    };
    let call = MethodCall::new(method, args);
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(dispatch(call));
    rt.shutdown_background();
    result
}

/// Print the reply as JSON. A call that leaves alarms pending (e.g.
/// `scheduleAlarm`) keeps the process alive as an alarm host until they
/// resolve.
async fn dispatch(call: MethodCall) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open(tokio::runtime::Handle::current())?;
    let reply = host.bridge.handle(&call)?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    if host.controller.scheduler().pending().is_empty() {
        return Ok(());
    }
    tracing::info!("hosting pending alarms until they resolve");
    host.serve().await
}
