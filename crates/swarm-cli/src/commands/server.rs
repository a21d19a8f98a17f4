//! `swarm server`: Start the SwarmOS HTTP backend server.

use swarm_core::SwarmConfig;

pub async fn run(host: String, port: u16, config: SwarmConfig) -> Result<(), String> {
    let server_config = swarm_server::ServerConfig {
        host: host.clone(),
        port,
        swarm: config,
    };

    println!("Starting SwarmOS server on {}:{}...", host, port);

    let addr = swarm_server::start_server(server_config).await?;
    println!("SwarmOS server listening on http://{}", addr);
    println!("  REST:      http://{}/api/v1", addr);
    println!("  Progress:  ws://{}/api/v1/ws", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
