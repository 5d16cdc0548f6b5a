//! `rlmgate models`: List the model catalog and backend readiness.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let handler = super::build_handler(&config)?;
    let models = handler.orchestrator().models();

    println!("Models");
    println!("======");
    println!();
    println!(
        "  {:<36} {:<11} {:<9} {:>10} {:>10} {:>9}",
        "ID", "BACKEND", "TIER", "IN $/M", "OUT $/M", "CONTEXT"
    );
    for m in &models.models {
        let ready = if models.ready_backends.contains(&m.backend) { "" } else { " (no credential)" };
        println!(
            "  {:<36} {:<11} {:<9} {:>10.3} {:>10.3} {:>9}{ready}",
            m.id, m.backend.as_str(), m.tier.as_str(), m.input_per_m, m.output_per_m, m.context_window
        );
    }

    println!();
    println!("  Tier defaults:");
    println!("    cheap     {}", models.tiers.cheap);
    println!("    standard  {}", models.tiers.standard);
    println!("    premium   {}", models.tiers.premium);
    println!("    local     {}", models.tiers.local);
    println!();
    println!("  Preferred backend: {}", models.preferred_backend);
    let ready: Vec<String> = models.ready_backends.iter().map(|b| b.to_string()).collect();
    println!("  Ready backends:    {}", ready.join(", "));

    Ok(())
}
