//! One-shot commands that talk to the backend without starting the TUI

use anyhow::{bail, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use ragchat_core::upload::validate_upload;
use ragchat_core::{
    parse_message_content, AskRequest, Config, ContentPart, KeyValueStore, Preferences, RagClient,
};

pub async fn ask(
    client: &RagClient,
    store: &dyn KeyValueStore,
    question: &str,
    model: Option<String>,
) -> Result<()> {
    let prefs = Preferences::load(store);

    let model = match model {
        Some(m) => m,
        None if !prefs.selected_model.is_empty() => prefs.selected_model.clone(),
        None => match client.list_models().await {
            Ok(models) => models.into_iter().next().map(|m| m.name).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not list models");
                String::new()
            }
        },
    };

    let request = AskRequest {
        text: question.to_string(),
        stream: false,
        history: Vec::new(),
        personalization: prefs.personalization.build_prompt(),
        model: model.clone(),
    };

    // Ctrl+C abandons the request instead of killing the process mid-print
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let label = if model.is_empty() { "the default model" } else { model.as_str() };
    println!("🤖 Asking {}...\n", label.bold().magenta());

    match client.ask(&request, &cancel).await {
        Ok(response) => match response.into_answer() {
            Some(answer) => print_answer(&answer),
            None => println!("{}", "No response received.".yellow()),
        },
        Err(e) if e.is_cancelled() => {
            println!("{}", "⚠️ Response generation stopped by user.".yellow());
        }
        Err(e) => {
            println!("{}: {}", "Error querying backend".red(), e);
            println!("Make sure the backend is running at {}", client.base_url().bold());
        }
    }

    Ok(())
}

fn print_answer(answer: &str) {
    println!("{}", "Response:".bold().green());
    for part in parse_message_content(answer) {
        match part {
            ContentPart::Markdown(text) => println!("{}\n", text),
            ContentPart::Code { language, content } => {
                println!("{}", format!("── {} ──", language).dimmed());
                println!("{}\n", content.cyan());
            }
        }
    }
}

pub async fn list_models(client: &RagClient, store: &dyn KeyValueStore) -> Result<()> {
    let selected = Preferences::load(store).selected_model;

    println!("\n{}", "🤖 Available Models".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    match client.list_models().await {
        Ok(models) => {
            if models.is_empty() {
                println!("{}", "No models found. Pull a model with: ollama pull llama3.2".yellow());
            } else {
                for model in models {
                    if model.name == selected {
                        println!("  • {} {}", model.name.green().bold(), "(selected)".dimmed());
                    } else {
                        println!("  • {}", model.name.green());
                    }
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error connecting to backend".red(), e);
            println!("Make sure the backend is running at {}", client.base_url().bold());
        }
    }

    Ok(())
}

pub async fn list_documents(client: &RagClient) -> Result<()> {
    let stats = client.list_documents().await?;

    println!("\n{}", "📚 Knowledge Base".bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    println!(
        "{} documents, {} chunks",
        stats.total_documents.to_string().bold(),
        stats.total_chunks.to_string().bold()
    );

    if stats.documents.is_empty() {
        println!("\n{}", "No documents uploaded yet".yellow());
    } else {
        println!();
        for doc in &stats.documents {
            println!("  • {}", doc);
        }
    }

    Ok(())
}

pub async fn upload(client: &RagClient, path: &Path) -> Result<()> {
    let file = validate_upload(path)?;
    println!("📤 Uploading {} ({})...", file.name.cyan(), file.size_kb().dimmed());

    match client.upload(path).await {
        Ok(response) => {
            println!(
                "{}",
                format!("✅ {} ({} chunks created)", response.message, response.chunks).green()
            );
            Ok(())
        }
        Err(e) => bail!(
            "❌ Error: {}. Make sure the backend server is running.",
            e.detail()
        ),
    }
}

pub async fn clear_documents(client: &RagClient, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Are you sure you want to clear all documents?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    match client.clear_documents().await {
        Ok(_) => {
            println!("{}", "✅ All documents cleared".green());
            Ok(())
        }
        Err(e) => bail!("❌ Error clearing documents: {}", e),
    }
}

pub fn show_config(config: &Config, save: bool) -> Result<()> {
    println!("\n{}", "⚙️  Configuration".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  server_url   {}", config.server_url.green());
    println!("  timeout      {}s", config.request_timeout_secs);
    println!("  log_level    {}", config.log_level);
    match config.resolve_data_dir() {
        Ok(dir) => println!("  data_dir     {}", dir.display()),
        Err(e) => println!("  data_dir     {}", e.to_string().yellow()),
    }

    if save {
        config.save()?;
        println!(
            "\n{} {}",
            "✅ Saved to".green(),
            Config::get_config_path()?.display()
        );
    }

    Ok(())
}
