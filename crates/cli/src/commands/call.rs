//! `rlmgate call`: Run a single request and print the reply.

use serde_json::Value;

pub async fn run(name: &str, arguments: Option<&str>) -> Result<bool, Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let handler = super::build_handler(&config)?;

    let arguments: Value = match arguments {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Arguments are not valid JSON: {e}"))?,
        None => Value::Null,
    };

    let reply = handler.handle(name, arguments).await;
    if reply.is_error {
        eprintln!("{}", reply.joined_text());
    } else {
        println!("{}", reply.joined_text());
    }
    Ok(!reply.is_error)
}
