//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use openracing_acserver_client::{ClientConfig, PluginStats};
use serde_json::json;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

pub fn print_config(config: &ClientConfig, json: bool) -> anyhow::Result<()> {
    if json {
        let output = json!({
            "success": true,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Server plugin client configuration:".bold());
    println!("  Listening port:   {}", config.listening_port);
    println!(
        "  Server:           {}:{}",
        config.remote_host, config.remote_port
    );
    println!("  Capacity:         {} cars", config.capacity);
    println!(
        "  Realtime updates: every {} ms",
        config.realtime_update_interval_ms
    );
    println!(
        "  Admin commands:   {}",
        if config.admin_password.is_empty() {
            "disabled".dimmed()
        } else {
            "enabled".green()
        }
    );
    match config.keep_alive_interval() {
        Some(interval) => println!("  Keep-alive:       {}s", interval.as_secs()),
        None => println!("  Keep-alive:       {}", "disabled".dimmed()),
    }
    if config.new_session_start_delay_ms > 0 {
        println!(
            "  Rotation delay:   {} ms",
            config.new_session_start_delay_ms
        );
    }
    for plugin in &config.external_plugins {
        println!(
            "  Relay:            :{} <-> {}:{}",
            plugin.listening_port, plugin.remote_host, plugin.remote_port
        );
    }
    Ok(())
}

pub fn print_plugin_stats(stats: &[PluginStats], json: bool) -> anyhow::Result<()> {
    if json {
        let output = json!({
            "success": true,
            "plugins": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if stats.is_empty() {
        return Ok(());
    }
    println!("{}", "Plugin deliveries:".bold());
    for entry in stats {
        let failed = if entry.failed == 0 {
            entry.failed.to_string().normal()
        } else {
            entry.failed.to_string().red()
        };
        println!(
            "  {} delivered {}, failed {}",
            entry.name.bold(),
            entry.delivered,
            failed
        );
    }
    Ok(())
}
